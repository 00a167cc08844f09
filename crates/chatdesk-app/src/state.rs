// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;
use std::rc::Rc;

use crate::Conversation;

/// Slot holding the conversation shown in the main pane.
pub const ACTIVE_SLOT: usize = 0;

/// Shared, UI-thread-only store of conversation slots.
///
/// Every clone points at the same slots, so any number of widgets can read
/// and update them. Updates are last-writer-wins.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    slots: Rc<RefCell<Vec<Option<Conversation>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<Conversation> {
        self.slots.borrow().get(index).cloned().flatten()
    }

    pub fn set(&self, index: usize, conversation: Option<Conversation>) {
        let mut slots = self.slots.borrow_mut();
        if slots.len() <= index {
            if conversation.is_none() {
                return;
            }
            slots.resize(index + 1, None);
        }
        slots[index] = conversation;
    }

    /// Replaces the slot with `f(previous)`. The closure runs after the
    /// borrow is released, so it may read the store itself.
    pub fn update<F>(&self, index: usize, f: F)
    where
        F: FnOnce(Option<Conversation>) -> Option<Conversation>,
    {
        let previous = self.get(index);
        self.set(index, f(previous));
    }

    pub fn slot(&self, index: usize) -> ConversationSlot {
        ConversationSlot {
            store: self.clone(),
            index,
        }
    }
}

/// Narrow read/update handle onto one slot of a [`ConversationStore`].
#[derive(Debug, Clone)]
pub struct ConversationSlot {
    store: ConversationStore,
    index: usize,
}

impl ConversationSlot {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn get(&self) -> Option<Conversation> {
        self.store.get(self.index)
    }

    pub fn set(&self, conversation: Option<Conversation>) {
        self.store.set(self.index, conversation);
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<Conversation>) -> Option<Conversation>,
    {
        self.store.update(self.index, f);
    }
}
