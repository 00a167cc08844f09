// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

pub const MAX_PROJECT_NAME_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: Option<ConversationId>,
    pub project_id: Option<ProjectId>,
    pub title: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Conversation {
    /// A conversation that exists only locally until its first message is stored.
    pub fn unsaved(title: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            conversation_id: Some(ConversationId::new_placeholder()),
            project_id: None,
            title: title.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_new(&self) -> bool {
        is_new_conversation(self.conversation_id.as_ref())
    }

    /// Copy of `self` with only the project association replaced.
    pub fn with_project(self, project_id: Option<ProjectId>) -> Self {
        Self { project_id, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Payload of the project list provider. The provider hands out
/// `Option<ProjectsResponse>`, with `None` while the list is still loading.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectsResponse {
    pub projects: Vec<Project>,
}

impl ProjectsResponse {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }
}

/// Request to persist a conversation's project association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignProject {
    pub conversation_id: ConversationId,
    pub project_id: Option<ProjectId>,
}

pub fn validate_project_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("project name is required -- enter a name and retry");
    }
    let chars = trimmed.chars().count();
    if chars > MAX_PROJECT_NAME_CHARS {
        bail!(
            "project name is {chars} characters; shorten it to at most {MAX_PROJECT_NAME_CHARS}"
        );
    }
    if trimmed.chars().any(char::is_control) {
        bail!("project name contains control characters; remove them and retry");
    }
    Ok(())
}
