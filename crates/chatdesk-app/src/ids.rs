// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation id used for a conversation that has not been stored yet.
pub const NEW_CONVERSATION_ID: &str = "new";

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns `None` for blank input, which callers treat as "unset".
            pub fn parse(value: &str) -> Option<Self> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(Self(trimmed.to_owned()))
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

entity_id!(ConversationId);
entity_id!(ProjectId);

impl ConversationId {
    pub fn new_placeholder() -> Self {
        Self(NEW_CONVERSATION_ID.to_owned())
    }
}

/// A conversation is new until the server side knows its id.
pub fn is_new_conversation(id: Option<&ConversationId>) -> bool {
    match id {
        None => true,
        Some(id) => id.as_str().is_empty() || id.as_str() == NEW_CONVERSATION_ID,
    }
}
