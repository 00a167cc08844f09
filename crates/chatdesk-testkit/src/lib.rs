// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use chatdesk_app::{
    AssignProject, Conversation, ConversationId, Project, ProjectAssigner, ProjectId,
};
use std::cell::RefCell;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const PROJECT_NAMES: [&str; 14] = [
    "Research",
    "Personal",
    "Work",
    "Side Quest",
    "Reading List",
    "Travel",
    "Cooking",
    "Garden",
    "Taxes",
    "Fitness",
    "Writing",
    "Home Lab",
    "Job Search",
    "Language Practice",
];

const TITLE_VERBS: [&str; 10] = [
    "Draft",
    "Summarize",
    "Plan",
    "Review",
    "Outline",
    "Compare",
    "Brainstorm",
    "Explain",
    "Debug",
    "Translate",
];

const TITLE_SUBJECTS: [&str; 12] = [
    "quarterly report",
    "trip itinerary",
    "grocery list",
    "cover letter",
    "sourdough schedule",
    "router config",
    "reading notes",
    "budget spreadsheet",
    "meeting agenda",
    "workout split",
    "API error",
    "birthday toast",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }
}

/// Seeded generator of plausible projects and conversations.
#[derive(Debug, Clone)]
pub struct ChatFaker {
    rng: DeterministicRng,
    sequence: u64,
}

impl ChatFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            sequence: 0,
        }
    }

    pub fn project_name(&mut self) -> String {
        self.pick(&PROJECT_NAMES).to_owned()
    }

    pub fn conversation_title(&mut self) -> String {
        format!(
            "{} the {}",
            self.pick(&TITLE_VERBS),
            self.pick(&TITLE_SUBJECTS)
        )
    }

    pub fn project(&mut self) -> Project {
        let id = self.next_id("proj");
        let created_at = self.timestamp();
        Project {
            id: ProjectId::new(id),
            name: self.project_name(),
            created_at,
            updated_at: created_at,
        }
    }

    /// Projects with distinct names, in creation order.
    pub fn projects(&mut self, count: usize) -> Vec<Project> {
        let mut projects: Vec<Project> = Vec::with_capacity(count);
        while projects.len() < count.min(PROJECT_NAMES.len()) {
            let candidate = self.project();
            if projects.iter().all(|project| project.name != candidate.name) {
                projects.push(candidate);
            }
        }
        projects
    }

    pub fn conversation(&mut self) -> Conversation {
        let id = self.next_id("conv");
        let created_at = self.timestamp();
        Conversation {
            conversation_id: Some(ConversationId::new(id)),
            project_id: None,
            title: self.conversation_title(),
            created_at,
            updated_at: created_at,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence = self.sequence.saturating_add(1);
        format!("{prefix}-{:04x}{:04}", self.rng.next_u64() & 0xffff, self.sequence)
    }

    fn timestamp(&mut self) -> OffsetDateTime {
        let start = reference_now();
        let offset = (self.rng.next_u64() % (365 * 24 * 60 * 60)) as i64;
        start + Duration::seconds(offset)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

/// [`ProjectAssigner`] that only records what it was asked to persist.
#[derive(Debug, Default)]
pub struct RecordingAssigner {
    requests: RefCell<Vec<AssignProject>>,
}

impl RecordingAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<AssignProject> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl ProjectAssigner for RecordingAssigner {
    fn assign(&self, request: AssignProject) {
        self.requests.borrow_mut().push(request);
    }
}

pub fn project(id: &str, name: &str) -> Project {
    Project {
        id: ProjectId::new(id),
        name: name.to_owned(),
        created_at: reference_now(),
        updated_at: reference_now(),
    }
}

pub fn conversation(id: Option<&str>, project_id: Option<&str>) -> Conversation {
    Conversation {
        conversation_id: id.map(ConversationId::new),
        project_id: project_id.map(ProjectId::new),
        title: "Fixture conversation".to_owned(),
        created_at: reference_now(),
        updated_at: reference_now(),
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("chatdesk.db");
    Ok((dir, db_path))
}

pub fn project_names() -> &'static [&'static str] {
    &PROJECT_NAMES
}

fn reference_now() -> OffsetDateTime {
    datetime!(2026-01-01 0:00 UTC)
}

#[cfg(test)]
mod tests {
    use super::{ChatFaker, RecordingAssigner, conversation, project, project_names};
    use chatdesk_app::{AssignProject, ConversationId, ProjectAssigner, ProjectId};
    use std::collections::BTreeSet;

    #[test]
    fn same_seed_same_output() {
        let mut left = ChatFaker::new(11);
        let mut right = ChatFaker::new(11);
        assert_eq!(left.project(), right.project());
        assert_eq!(left.conversation(), right.conversation());
    }

    #[test]
    fn projects_have_unique_ids_and_names() {
        let mut faker = ChatFaker::new(3);
        let projects = faker.projects(6);
        assert_eq!(projects.len(), 6);

        let ids = projects.iter().map(|p| p.id.clone()).collect::<BTreeSet<_>>();
        let names = projects.iter().map(|p| p.name.clone()).collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), 6);
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn projects_request_is_capped_by_name_pool() {
        let mut faker = ChatFaker::new(5);
        assert_eq!(faker.projects(100).len(), project_names().len());
    }

    #[test]
    fn conversations_are_stored_not_new() {
        let mut faker = ChatFaker::new(9);
        let conversation = faker.conversation();
        assert!(!conversation.is_new());
        assert!(!conversation.title.is_empty());
    }

    #[test]
    fn variety_across_seeds() {
        let mut titles = BTreeSet::new();
        for seed in 0_u64..20_u64 {
            titles.insert(ChatFaker::new(seed).conversation_title());
        }
        assert!(titles.len() >= 10, "got {}", titles.len());
    }

    #[test]
    fn recording_assigner_keeps_order() {
        let assigner = RecordingAssigner::new();
        for project_id in [Some("p1"), None] {
            assigner.assign(AssignProject {
                conversation_id: ConversationId::new("abc"),
                project_id: project_id.map(ProjectId::new),
            });
        }
        let requests = assigner.requests();
        assert_eq!(assigner.request_count(), 2);
        assert_eq!(requests[0].project_id, Some(ProjectId::new("p1")));
        assert_eq!(requests[1].project_id, None);
    }

    #[test]
    fn fixture_builders() {
        assert_eq!(project("p1", "Research").name, "Research");
        assert!(conversation(Some("new"), None).is_new());
        assert_eq!(
            conversation(Some("abc"), Some("p1")).project_id,
            Some(ProjectId::new("p1"))
        );
    }
}
