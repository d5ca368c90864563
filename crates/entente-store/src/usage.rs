//! Append-only ledger of token usage per call.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use entente_core::{CallIdentity, TokenUsage};

use crate::database::Database;
use crate::error::StoreError;

/// One completed model call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Row id assigned by SQLite.
    pub id: i64,
    /// Game the call was made for.
    pub game_id: String,
    /// Agent the call was made for.
    pub agent_id: String,
    /// Game phase of the call.
    pub phase: String,
    /// Model identifier the call went to.
    pub model: String,
    /// Prompt tokens.
    pub input_tokens: i64,
    /// Generated tokens.
    pub output_tokens: i64,
    /// RFC 3339.
    pub created_at: String,
}

/// Summed usage for one agent within a game.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUsage {
    /// Agent the call was made for.
    pub agent_id: String,
    /// Calls recorded for this agent.
    pub calls: i64,
    /// Prompt tokens.
    pub input_tokens: i64,
    /// Generated tokens.
    pub output_tokens: i64,
}

/// Summed usage for a whole game.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTotals {
    /// Calls recorded for the game.
    pub calls: i64,
    /// Prompt tokens.
    pub input_tokens: i64,
    /// Generated tokens.
    pub output_tokens: i64,
}

/// Somewhere completed calls can be recorded.
///
/// Implementations are synchronous; the coordinator runs them on the
/// blocking pool.
pub trait UsageSink: Send + Sync {
    /// Record one completed call.
    fn record_usage(&self, identity: &CallIdentity, model: &str, usage: TokenUsage) -> Result<(), StoreError>;
}

/// Usage ledger backed by SQLite.
#[derive(Clone)]
pub struct UsageRepo {
    db: Database,
}

fn to_sql_count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl UsageRepo {
    /// A repository over an open database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert one row and return it.
    pub fn record(&self, identity: &CallIdentity, model: &str, usage: TokenUsage) -> Result<UsageRecord, StoreError> {
        let now = Utc::now().to_rfc3339();
        let input_tokens = to_sql_count(usage.input_tokens);
        let output_tokens = to_sql_count(usage.output_tokens);

        let id = self.db.with_conn(|conn| {
            let _ = conn.execute(
                "INSERT INTO usage (game_id, agent_id, phase, model, input_tokens, output_tokens, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    identity.game_id,
                    identity.agent_id,
                    identity.phase,
                    model,
                    input_tokens,
                    output_tokens,
                    now,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(UsageRecord {
            id,
            game_id: identity.game_id.clone(),
            agent_id: identity.agent_id.clone(),
            phase: identity.phase.clone(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            created_at: now,
        })
    }

    /// All rows for a game, oldest first.
    pub fn list_for_game(&self, game_id: &str) -> Result<Vec<UsageRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, game_id, agent_id, phase, model, input_tokens, output_tokens, created_at
                 FROM usage WHERE game_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([game_id], |row| {
                Ok(UsageRecord {
                    id: row.get(0)?,
                    game_id: row.get(1)?,
                    agent_id: row.get(2)?,
                    phase: row.get(3)?,
                    model: row.get(4)?,
                    input_tokens: row.get(5)?,
                    output_tokens: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Per-agent totals for a game, ordered by agent id.
    pub fn usage_by_agent(&self, game_id: &str) -> Result<Vec<AgentUsage>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT agent_id, COUNT(*), COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0)
                 FROM usage WHERE game_id = ?1
                 GROUP BY agent_id ORDER BY agent_id",
            )?;
            let rows = stmt.query_map([game_id], |row| {
                Ok(AgentUsage {
                    agent_id: row.get(0)?,
                    calls: row.get(1)?,
                    input_tokens: row.get(2)?,
                    output_tokens: row.get(3)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Totals for a game. Zero for an unknown game.
    pub fn game_total(&self, game_id: &str) -> Result<UsageTotals, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(input_tokens), 0), COALESCE(SUM(output_tokens), 0)
                 FROM usage WHERE game_id = ?1",
                [game_id],
                |row| {
                    Ok(UsageTotals {
                        calls: row.get(0)?,
                        input_tokens: row.get(1)?,
                        output_tokens: row.get(2)?,
                    })
                },
            )?)
        })
    }

    /// Rows in the ledger.
    pub fn count(&self) -> Result<i64, StoreError> {
        self.db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM usage", [], |row| row.get(0))?))
    }
}

impl UsageSink for UsageRepo {
    fn record_usage(&self, identity: &CallIdentity, model: &str, usage: TokenUsage) -> Result<(), StoreError> {
        self.record(identity, model, usage).map(|_| ())
    }
}
