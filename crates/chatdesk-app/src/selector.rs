// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Project selector: a trigger that opens a dropdown of projects and assigns
//! the active conversation to the chosen one.
//!
//! The selector owns only its overlay state. The conversation lives in a
//! shared [`ConversationSlot`], the project list is passed in at render time,
//! and persistence goes through a [`ProjectAssigner`].

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::{
    AssignProject, Bounds, Conversation, ConversationSlot, KEY_ASSIGN_PROJECT, KEY_GENERAL,
    ListenerGuard, Localizer, Point, PointerHub, Project, ProjectId, ProjectsResponse,
    is_new_conversation,
};

/// Cells between the trigger's bottom edge and the dropdown.
pub const DEFAULT_DROPDOWN_GAP: u16 = 4;

/// Persists a conversation's project association.
///
/// Calls are fire-and-forget: implementations own retries and error
/// reporting, and the selector never learns the outcome.
pub trait ProjectAssigner {
    fn assign(&self, request: AssignProject);
}

impl<T: ProjectAssigner + ?Sized> ProjectAssigner for Rc<T> {
    fn assign(&self, request: AssignProject) {
        (**self).assign(request);
    }
}

impl<T: ProjectAssigner + ?Sized> ProjectAssigner for Box<T> {
    fn assign(&self, request: AssignProject) {
        (**self).assign(request);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub top: u16,
    pub left: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorCommand {
    Open,
    Close,
    Toggle,
    Select(Option<ProjectId>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorEvent {
    OverlayChanged(OverlayState),
    ProjectChanged(Option<ProjectId>),
    AssignmentRequested(AssignProject),
}

#[derive(Debug, Default)]
struct Overlay {
    open: Cell<bool>,
    trigger: Cell<Option<Bounds>>,
    dropdown: Cell<Option<Bounds>>,
}

impl Overlay {
    fn state(&self) -> OverlayState {
        if self.open.get() {
            OverlayState::Open
        } else {
            OverlayState::Closed
        }
    }

    fn dismiss_if_outside(&self, point: Point) {
        if let (Some(trigger), Some(dropdown)) = (self.trigger.get(), self.dropdown.get())
            && !trigger.contains(point)
            && !dropdown.contains(point)
        {
            self.open.set(false);
        }
    }
}

pub struct ProjectSelector<A> {
    overlay: Rc<Overlay>,
    slot: ConversationSlot,
    assigner: A,
    gap: u16,
    _dismiss: ListenerGuard,
}

impl<A: ProjectAssigner> ProjectSelector<A> {
    /// Mounts the selector: registers its outside-click listener with
    /// `pointer`. Dropping the selector unregisters it.
    pub fn mount(pointer: &PointerHub, slot: ConversationSlot, assigner: A) -> Self {
        let overlay = Rc::new(Overlay::default());
        let listener_overlay = Rc::clone(&overlay);
        let dismiss = pointer.listen(move |point| listener_overlay.dismiss_if_outside(point));
        Self {
            overlay,
            slot,
            assigner,
            gap: DEFAULT_DROPDOWN_GAP,
            _dismiss: dismiss,
        }
    }

    pub fn with_gap(mut self, gap: u16) -> Self {
        self.gap = gap;
        self
    }

    pub fn state(&self) -> OverlayState {
        self.overlay.state()
    }

    pub fn is_open(&self) -> bool {
        self.overlay.open.get()
    }

    pub fn slot(&self) -> &ConversationSlot {
        &self.slot
    }

    pub fn dispatch(&self, command: SelectorCommand) -> Vec<SelectorEvent> {
        match command {
            SelectorCommand::Open => self.open(),
            SelectorCommand::Close => self.close(),
            SelectorCommand::Toggle => self.toggle(),
            SelectorCommand::Select(project_id) => self.select(project_id),
        }
    }

    pub fn open(&self) -> Vec<SelectorEvent> {
        self.set_open(true)
    }

    pub fn close(&self) -> Vec<SelectorEvent> {
        self.set_open(false)
    }

    pub fn toggle(&self) -> Vec<SelectorEvent> {
        self.set_open(!self.is_open())
    }

    fn set_open(&self, open: bool) -> Vec<SelectorEvent> {
        self.overlay.open.set(open);
        vec![SelectorEvent::OverlayChanged(self.state())]
    }

    /// Assigns the active conversation to `project_id`, or clears its project
    /// for `None`.
    ///
    /// The shared slot is updated first, then persistence is requested for
    /// stored conversations, then the overlay closes. Repeated calls each
    /// issue their own request.
    pub fn select(&self, project_id: Option<ProjectId>) -> Vec<SelectorEvent> {
        let mut events = Vec::with_capacity(3);
        let conversation_id = self
            .slot
            .get()
            .and_then(|conversation| conversation.conversation_id);

        let mut applied = false;
        self.slot.update(|previous| {
            previous.map(|conversation| {
                applied = true;
                conversation.with_project(project_id.clone())
            })
        });
        if applied {
            events.push(SelectorEvent::ProjectChanged(project_id.clone()));
        }

        if !is_new_conversation(conversation_id.as_ref())
            && let Some(conversation_id) = conversation_id
        {
            let request = AssignProject {
                conversation_id,
                project_id,
            };
            self.assigner.assign(request.clone());
            events.push(SelectorEvent::AssignmentRequested(request));
        }

        events.extend(self.close());
        events
    }

    /// Records where the trigger was laid out, or `None` when unmounted.
    pub fn mount_trigger(&self, bounds: Option<Bounds>) {
        self.overlay.trigger.set(bounds);
    }

    /// Records where the dropdown was laid out, or `None` when not shown.
    pub fn mount_dropdown(&self, bounds: Option<Bounds>) {
        self.overlay.dropdown.set(bounds);
    }

    pub fn trigger_bounds(&self) -> Option<Bounds> {
        self.overlay.trigger.get()
    }

    pub fn dropdown_bounds(&self) -> Option<Bounds> {
        self.overlay.dropdown.get()
    }

    /// Anchors the dropdown under the trigger's current bounds.
    pub fn dropdown_position(&self) -> Position {
        dropdown_position(self.overlay.trigger.get(), self.gap)
    }

    pub fn view(&self, projects: Option<&ProjectsResponse>, localizer: &Localizer) -> SelectorView {
        project_selector_view(self.slot.get().as_ref(), projects, localizer)
    }
}

pub fn dropdown_position(trigger: Option<Bounds>, gap: u16) -> Position {
    match trigger {
        Some(bounds) => Position {
            top: bounds.bottom().saturating_add(gap),
            left: bounds.left(),
        },
        None => Position::default(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorOption {
    /// Project to assign, or `None` for the general option.
    pub target: Option<ProjectId>,
    pub label: String,
    pub selected: bool,
    /// Shown on the general option when a project is currently set.
    pub clearable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorView {
    pub trigger_label: String,
    pub accessible_label: String,
    pub options: Vec<SelectorOption>,
    /// True when project options follow the general option.
    pub has_projects: bool,
}

pub fn project_selector_view(
    conversation: Option<&Conversation>,
    projects: Option<&ProjectsResponse>,
    localizer: &Localizer,
) -> SelectorView {
    let projects: &[Project] = projects
        .map(|response| response.projects.as_slice())
        .unwrap_or(&[]);
    let by_id = projects
        .iter()
        .map(|project| (&project.id, project))
        .collect::<HashMap<_, _>>();

    let current_project_id = conversation
        .and_then(|conversation| conversation.project_id.as_ref())
        .filter(|id| !id.as_str().is_empty());
    let general_label = localizer.localize(KEY_GENERAL);
    let trigger_label = current_project_id
        .and_then(|id| by_id.get(id))
        .map_or_else(|| general_label.clone(), |project| project.name.clone());

    let mut options = Vec::with_capacity(projects.len() + 1);
    options.push(SelectorOption {
        target: None,
        label: general_label,
        selected: current_project_id.is_none(),
        clearable: current_project_id.is_some(),
    });
    options.extend(projects.iter().map(|project| SelectorOption {
        target: Some(project.id.clone()),
        label: project.name.clone(),
        selected: current_project_id == Some(&project.id),
        clearable: false,
    }));

    SelectorView {
        trigger_label,
        accessible_label: localizer.localize(KEY_ASSIGN_PROJECT),
        options,
        has_projects: !projects.is_empty(),
    }
}
