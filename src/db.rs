// 🗄️ SQLite Store - Local stand-in for the external document store
//
// users/{uid} and plans/{id} documents live in two tables. Every user
// creation and plan change is also appended to the events table.

use crate::store::{PlanDocument, PlanStore, UserDocument};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Users (one document per identity)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            uid TEXT PRIMARY KEY,
            plan TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Plans (feature list per plan id, JSON array)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans (
            plan_id TEXT PRIMARY KEY,
            features TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_plan ON users(plan)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, newest first
pub fn get_events_for_entity(conn: &Connection, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| {
            Ok(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .context("Invalid event timestamp")?
                    .with_timezone(&Utc),
                event_type,
                entity_type,
                entity_id,
                data: serde_json::from_str(&data).context("Invalid event data")?,
                actor,
            })
        })
        .collect()
}

// ============================================================================
// STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {:?}", path.as_ref()))?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn user_count(&self) -> Result<i64> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Number of users on each plan, ordered by plan id
    pub fn plan_distribution(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT plan, COUNT(*) FROM users GROUP BY plan ORDER BY plan")?;
        let rows: Vec<(String, i64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl PlanStore for SqliteStore {
    fn get_user(&self, uid: &str) -> Result<Option<UserDocument>> {
        let doc = self
            .conn
            .query_row(
                "SELECT plan, name, last_name, email FROM users WHERE uid = ?1",
                params![uid],
                |row| {
                    Ok(UserDocument {
                        plan: row.get(0)?,
                        name: row.get(1)?,
                        last_name: row.get(2)?,
                        email: row.get(3)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("Failed to read user {}", uid))?;
        Ok(doc)
    }

    fn create_user(&self, uid: &str, doc: &UserDocument) -> Result<bool> {
        // Row and audit event land together or not at all
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO users (uid, plan, name, last_name, email)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uid, doc.plan, doc.name, doc.last_name, doc.email],
        )?;

        if inserted == 0 {
            debug!(uid, "user document already exists");
            return Ok(false);
        }

        let event = Event::new(
            "user_created",
            "user",
            uid,
            serde_json::json!({ "plan": doc.plan, "email": doc.email }),
            "session",
        );
        insert_event(&tx, &event)?;
        tx.commit().context("Failed to commit user creation")?;
        info!(uid, plan = %doc.plan, "user document created");
        Ok(true)
    }

    fn set_user_plan(&self, uid: &str, plan: &str) -> Result<()> {
        let previous = self
            .get_user(uid)?
            .with_context(|| format!("No user document for {}", uid))?
            .plan;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("UPDATE users SET plan = ?1 WHERE uid = ?2", params![plan, uid])?;

        let event = Event::new(
            "plan_changed",
            "user",
            uid,
            serde_json::json!({ "from": previous, "to": plan }),
            "billing",
        );
        insert_event(&tx, &event)?;
        tx.commit().context("Failed to commit plan change")?;
        info!(uid, from = %previous, to = %plan, "plan changed");
        Ok(())
    }

    fn get_plan(&self, plan_id: &str) -> Result<Option<PlanDocument>> {
        let features: Option<String> = self
            .conn
            .query_row(
                "SELECT features FROM plans WHERE plan_id = ?1",
                params![plan_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read plan {}", plan_id))?;

        match features {
            Some(json) => {
                let features: Vec<String> = serde_json::from_str(&json)
                    .with_context(|| format!("Invalid feature list for plan {}", plan_id))?;
                Ok(Some(PlanDocument { features }))
            }
            None => Ok(None),
        }
    }

    fn put_plan(&self, plan_id: &str, doc: &PlanDocument) -> Result<()> {
        let features = serde_json::to_string(&doc.features)?;
        self.conn.execute(
            "INSERT INTO plans (plan_id, features) VALUES (?1, ?2)
             ON CONFLICT(plan_id) DO UPDATE SET features = excluded.features,
                                                updated_at = CURRENT_TIMESTAMP",
            params![plan_id, features],
        )?;
        Ok(())
    }
}
