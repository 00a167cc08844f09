// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use chatdesk_app::{
    AssignProject, Conversation, ConversationId, Project, ProjectId, is_new_conversation,
    validate_project_name,
};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

pub const APP_NAME: &str = "chatdesk";

const DEMO_PROJECTS: [&str; 3] = ["Research", "Personal", "Work"];

const DEMO_CONVERSATIONS: [(&str, Option<usize>); 4] = [
    ("Summarize the reading notes", Some(0)),
    ("Plan the trip itinerary", None),
    ("Draft the cover letter", Some(2)),
    ("Debug the router config", None),
];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("projects", &["id", "name", "created_at", "updated_at"]),
    (
        "conversations",
        &["id", "title", "project_id", "created_at", "updated_at"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_projects_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_name ON projects (name);",
    },
    RequiredIndex {
        name: "idx_projects_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_projects_created_at ON projects (created_at);",
    },
    RequiredIndex {
        name: "idx_conversations_project_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_conversations_project_id ON conversations (project_id);",
    },
    RequiredIndex {
        name: "idx_conversations_updated_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_conversations_updated_at ON conversations (updated_at);",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub title: String,
    pub project_id: Option<ProjectId>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            tracing::info!("creating chatdesk schema");
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)
    }

    pub fn create_project(&self, new_project: &NewProject) -> Result<ProjectId> {
        validate_project_name(&new_project.name)?;
        let name = new_project.name.trim();
        if self.find_project_by_name(name)?.is_some() {
            bail!("project {name:?} already exists -- pick a different name");
        }

        let id = ProjectId::new(Uuid::new_v4().simple().to_string());
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO projects (id, name, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ",
                params![id.as_str(), name, now, now],
            )
            .context("insert project")?;
        tracing::debug!(project_id = %id, name, "created project");
        Ok(id)
    }

    pub fn get_project(&self, project_id: &ProjectId) -> Result<Project> {
        self.conn
            .query_row(
                "
                SELECT id, name, created_at, updated_at
                FROM projects
                WHERE id = ?
                ",
                params![project_id.as_str()],
                project_from_row,
            )
            .optional()
            .with_context(|| format!("load project {project_id}"))?
            .ok_or_else(|| {
                anyhow!("project {project_id} not found -- refresh the project list and retry")
            })
    }

    pub fn find_project_by_name(&self, name: &str) -> Result<Option<Project>> {
        self.conn
            .query_row(
                "
                SELECT id, name, created_at, updated_at
                FROM projects
                WHERE name = ?
                ",
                params![name.trim()],
                project_from_row,
            )
            .optional()
            .with_context(|| format!("look up project {name:?}"))
    }

    /// Projects in creation order; insertion order breaks timestamp ties.
    pub fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, name, created_at, updated_at
                FROM projects
                ORDER BY created_at ASC, rowid ASC
                ",
            )
            .context("prepare projects query")?;
        let rows = stmt
            .query_map([], project_from_row)
            .context("query projects")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect projects")
    }

    pub fn create_conversation(&self, conversation: &NewConversation) -> Result<ConversationId> {
        if let Some(project_id) = &conversation.project_id {
            self.get_project(project_id)?;
        }

        let id = ConversationId::new(Uuid::new_v4().simple().to_string());
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO conversations (id, title, project_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    id.as_str(),
                    conversation.title.trim(),
                    conversation.project_id.as_ref().map(ProjectId::as_str),
                    now,
                    now,
                ],
            )
            .context("insert conversation")?;
        Ok(id)
    }

    pub fn get_conversation(&self, conversation_id: &ConversationId) -> Result<Conversation> {
        self.conn
            .query_row(
                "
                SELECT id, title, project_id, created_at, updated_at
                FROM conversations
                WHERE id = ?
                ",
                params![conversation_id.as_str()],
                conversation_from_row,
            )
            .optional()
            .with_context(|| format!("load conversation {conversation_id}"))?
            .ok_or_else(|| anyhow!("conversation {conversation_id} not found"))
    }

    /// Most recently updated first.
    pub fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT id, title, project_id, created_at, updated_at
                FROM conversations
                ORDER BY updated_at DESC, rowid DESC
                ",
            )
            .context("prepare conversations query")?;
        let rows = stmt
            .query_map([], conversation_from_row)
            .context("query conversations")?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect conversations")
    }

    /// Stores the project association of an existing conversation. `None`
    /// clears it.
    pub fn assign_conversation_project(&self, request: &AssignProject) -> Result<()> {
        let conversation_id = &request.conversation_id;
        if is_new_conversation(Some(conversation_id)) {
            bail!(
                "conversation {conversation_id:?} has not been saved yet; send a message before assigning a project"
            );
        }
        if let Some(project_id) = &request.project_id {
            self.get_project(project_id)?;
        }

        let now = now_rfc3339()?;
        let rows_affected = self
            .conn
            .execute(
                "
                UPDATE conversations
                SET project_id = ?, updated_at = ?
                WHERE id = ?
                ",
                params![
                    request.project_id.as_ref().map(ProjectId::as_str),
                    now,
                    conversation_id.as_str(),
                ],
            )
            .context("update conversation project")?;
        if rows_affected == 0 {
            bail!(
                "conversation {conversation_id} not found -- it may have been deleted elsewhere"
            );
        }
        tracing::debug!(
            conversation_id = %conversation_id,
            project_id = request.project_id.as_ref().map(ProjectId::as_str).unwrap_or("-"),
            "stored conversation project"
        );
        Ok(())
    }

    pub fn seed_demo_data(&self) -> Result<()> {
        let mut project_ids = Vec::with_capacity(DEMO_PROJECTS.len());
        for name in DEMO_PROJECTS {
            let id = match self.find_project_by_name(name)? {
                Some(existing) => existing.id,
                None => self.create_project(&NewProject {
                    name: name.to_owned(),
                })?,
            };
            project_ids.push(id);
        }

        for (title, project_index) in DEMO_CONVERSATIONS {
            self.create_conversation(&NewConversation {
                title: title.to_owned(),
                project_id: project_index.and_then(|index| project_ids.get(index).cloned()),
            })?;
        }
        Ok(())
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("CHATDESK_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set CHATDESK_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("chatdesk.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

/// True when `error` came from SQLite reporting a busy or locked database,
/// which a later attempt may not hit.
pub fn is_transient(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let created_at_raw: String = row.get(2)?;
    let updated_at_raw: String = row.get(3)?;
    Ok(Project {
        id: ProjectId::new(id),
        name: row.get(1)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let project_id: Option<String> = row.get(2)?;
    let created_at_raw: String = row.get(3)?;
    let updated_at_raw: String = row.get(4)?;
    Ok(Conversation {
        conversation_id: Some(ConversationId::new(id)),
        project_id: project_id.as_deref().and_then(ProjectId::parse),
        title: row.get(1)?,
        created_at: parse_datetime(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_datetime(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a chatdesk database or point [storage].db_path elsewhere"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}
