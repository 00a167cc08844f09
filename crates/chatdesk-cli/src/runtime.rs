// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use chatdesk_app::{AssignProject, Conversation, ProjectAssigner, ProjectsResponse};
use chatdesk_db::Store;
use chatdesk_tui::{AppRuntime, InternalEvent};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const BASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32) -> Self {
        Self {
            retries,
            backoff: BASE_BACKOFF,
        }
    }

    /// Linear: the n-th retry waits n times the base backoff.
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

pub struct DbRuntime {
    store: Arc<Mutex<Store>>,
    worker: AssignmentWorker,
}

impl DbRuntime {
    pub fn new(store: Store, policy: RetryPolicy) -> Result<Self> {
        let store = Arc::new(Mutex::new(store));
        let worker = AssignmentWorker::spawn(Arc::clone(&store), policy)?;
        Ok(Self { store, worker })
    }

    /// Waits for queued assignments to finish.
    pub fn shutdown(self) {
        self.worker.shutdown();
    }
}

impl AppRuntime for DbRuntime {
    fn load_conversations(&mut self) -> Result<Vec<Conversation>> {
        lock_store(&self.store)?.list_conversations()
    }

    fn load_projects(&mut self) -> Result<ProjectsResponse> {
        load_projects(&self.store)
    }

    fn spawn_project_load(&mut self, tx: Sender<InternalEvent>) -> Result<()> {
        let store = Arc::clone(&self.store);
        thread::Builder::new()
            .name("chatdesk-projects".to_owned())
            .spawn(move || {
                let event = match load_projects(&store) {
                    Ok(projects) => InternalEvent::ProjectsLoaded(projects),
                    Err(error) => InternalEvent::ProjectsFailed(format!("{error:#}")),
                };
                if tx.send(event).is_err() {
                    tracing::debug!("ui exited before the project list arrived");
                }
            })
            .context("spawn project loader")?;
        Ok(())
    }

    fn assigner(&mut self) -> Box<dyn ProjectAssigner> {
        Box::new(self.worker.assigner())
    }
}

fn load_projects(store: &Mutex<Store>) -> Result<ProjectsResponse> {
    let projects = lock_store(store)?.list_projects()?;
    Ok(ProjectsResponse::new(projects))
}

fn lock_store(store: &Mutex<Store>) -> Result<MutexGuard<'_, Store>> {
    store
        .lock()
        .map_err(|_| anyhow!("database handle poisoned by an earlier panic; restart chatdesk"))
}

/// Background thread that persists project assignments in arrival order.
pub struct AssignmentWorker {
    tx: Option<Sender<AssignProject>>,
    handle: Option<JoinHandle<()>>,
}

impl AssignmentWorker {
    pub fn spawn(store: Arc<Mutex<Store>>, policy: RetryPolicy) -> Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("chatdesk-assign".to_owned())
            .spawn(move || drain_assignments(&store, &rx, policy))
            .context("spawn assignment worker")?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn assigner(&self) -> QueuedAssigner {
        QueuedAssigner {
            tx: self.tx.clone(),
        }
    }

    /// Closes the queue and joins the thread once every assigner handed out
    /// has been dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("assignment worker panicked");
        }
    }
}

impl Drop for AssignmentWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone)]
pub struct QueuedAssigner {
    tx: Option<Sender<AssignProject>>,
}

impl ProjectAssigner for QueuedAssigner {
    fn assign(&self, request: AssignProject) {
        let Some(tx) = &self.tx else {
            tracing::error!(conversation_id = %request.conversation_id, "assignment queue closed");
            return;
        };
        if let Err(error) = tx.send(request) {
            tracing::error!(
                conversation_id = %error.0.conversation_id,
                "assignment worker stopped; project change not saved"
            );
        }
    }
}

fn drain_assignments(store: &Mutex<Store>, rx: &Receiver<AssignProject>, policy: RetryPolicy) {
    for request in rx {
        match persist_with_retry(store, &request, policy) {
            Ok(attempts) => tracing::debug!(
                conversation_id = %request.conversation_id,
                attempts,
                "project assignment saved"
            ),
            Err(error) => {
                let message = format!("{error:#}");
                tracing::error!(
                    conversation_id = %request.conversation_id,
                    error = %message,
                    "project assignment failed"
                );
            }
        }
    }
    tracing::debug!("assignment queue drained");
}

/// Returns how many attempts it took.
fn persist_with_retry(
    store: &Mutex<Store>,
    request: &AssignProject,
    policy: RetryPolicy,
) -> Result<u32> {
    let mut attempt = 0;
    loop {
        let result =
            lock_store(store).and_then(|store| store.assign_conversation_project(request));
        match result {
            Ok(()) => return Ok(attempt + 1),
            Err(error) if attempt < policy.retries && chatdesk_db::is_transient(&error) => {
                attempt += 1;
                let delay = policy.delay(attempt);
                tracing::warn!(
                    conversation_id = %request.conversation_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "database busy; retrying project assignment"
                );
                thread::sleep(delay);
            }
            Err(error) => return Err(error),
        }
    }
}
