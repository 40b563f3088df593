//! Run store.
//! Mission: durable home for runs and their phase artifacts, with expiration and
//! phase-dependency gating.

use crate::errors::PipelineError;
use crate::models::{BrandAnalysis, CompetitorAnalysis, CompetitorCandidate, Kernel, Run, RunStatus};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub struct RunStore {
    conn: Arc<Mutex<Connection>>,
    expiration: ChronoDuration,
}

impl RunStore {
    pub fn new(conn: Arc<Mutex<Connection>>, expiration_days: i64) -> anyhow::Result<Self> {
        {
            let conn = conn.lock();
            conn.execute(
                "CREATE TABLE IF NOT EXISTS runs (
                    run_id TEXT PRIMARY KEY,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    expires_at TEXT NOT NULL,
                    status TEXT NOT NULL,
                    metadata TEXT NOT NULL,
                    brand TEXT,
                    competitors_ten TEXT,
                    competitors_analyzed TEXT,
                    kernel TEXT
                )",
                [],
            )?;
            conn.execute(
                "CREATE TABLE IF NOT EXISTS api_metrics (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recorded_at TEXT NOT NULL,
                    endpoint TEXT NOT NULL,
                    status_code INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL,
                    api_key_fingerprint TEXT
                )",
                [],
            )?;
        }
        Ok(Self {
            conn,
            expiration: ChronoDuration::days(expiration_days),
        })
    }

    pub fn create(&self, metadata: serde_json::Value) -> anyhow::Result<Run> {
        let now = Utc::now();
        let run = Run {
            run_id: format!("run_{}", Uuid::new_v4()),
            created_at: now,
            updated_at: now,
            expires_at: now + self.expiration,
            status: RunStatus::Active,
            metadata,
            brand: None,
            competitors_ten: None,
            competitors_analyzed: None,
            kernel: None,
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO runs (run_id, created_at, updated_at, expires_at, status, metadata)
             VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
            params![
                run.run_id,
                run.created_at.to_rfc3339(),
                run.updated_at.to_rfc3339(),
                run.expires_at.to_rfc3339(),
                run.metadata.to_string(),
            ],
        )?;
        Ok(run)
    }

    /// Only active, unexpired rows are visible: archived/deleted runs and runs past
    /// their `expires_at` are treated as though they never existed.
    pub fn get(&self, run_id: &str) -> anyhow::Result<Option<Run>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT run_id, created_at, updated_at, expires_at, status, metadata,
                        brand, competitors_ten, competitors_analyzed, kernel
                 FROM runs WHERE run_id = ?1 AND status = 'active'",
                params![run_id],
                Self::row_to_run,
            )
            .optional()?;

        Ok(match row {
            Some(run) if run.expires_at > Utc::now() => Some(run),
            _ => None,
        })
    }

    pub fn save_brand(&self, run_id: &str, brand: &BrandAnalysis) -> Result<(), PipelineError> {
        self.require_active(run_id)?;
        self.update_column(run_id, "brand", brand)
    }

    pub fn save_competitors(
        &self,
        run_id: &str,
        competitors: &[CompetitorCandidate],
    ) -> Result<(), PipelineError> {
        let run = self.require_active(run_id)?;
        if run.brand.is_none() {
            return Err(PipelineError::PrereqMissing { missing_slot: "brand" });
        }
        self.update_column(run_id, "competitors_ten", competitors)
    }

    pub fn save_analyzed(
        &self,
        run_id: &str,
        analyzed: &[CompetitorAnalysis],
    ) -> Result<(), PipelineError> {
        let run = self.require_active(run_id)?;
        if run.competitors_ten.is_none() {
            return Err(PipelineError::PrereqMissing {
                missing_slot: "competitorsTen",
            });
        }
        self.update_column(run_id, "competitors_analyzed", analyzed)
    }

    pub fn save_kernel(&self, run_id: &str, kernel: &Kernel) -> Result<(), PipelineError> {
        let run = self.require_active(run_id)?;
        if run.brand.is_none() {
            return Err(PipelineError::PrereqMissing { missing_slot: "brand" });
        }
        if run.competitors_analyzed.is_none() {
            return Err(PipelineError::PrereqMissing {
                missing_slot: "competitorsAnalyzed",
            });
        }
        self.update_column(run_id, "kernel", kernel)
    }

    pub fn count(&self) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM runs WHERE status = 'active' AND expires_at > ?1",
            params![Utc::now().to_rfc3339()],
            |r| r.get(0),
        )?;
        Ok(count as u64)
    }

    /// Archive every expired active run. Returns the number reaped.
    pub fn reap(&self) -> anyhow::Result<u64> {
        let conn = self.conn.lock();
        let affected = conn.execute(
            "UPDATE runs SET status = 'archived', updated_at = ?1
             WHERE status = 'active' AND expires_at <= ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        if affected > 0 {
            info!(count = affected, "reaped expired runs");
        }
        Ok(affected as u64)
    }

    pub fn record_api_call(&self, endpoint: &str, status_code: u16, duration_ms: u64, api_key_fingerprint: Option<&str>) {
        let conn = self.conn.lock();
        let _ = conn.execute(
            "INSERT INTO api_metrics (recorded_at, endpoint, status_code, duration_ms, api_key_fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().to_rfc3339(),
                endpoint,
                status_code as i64,
                duration_ms as i64,
                api_key_fingerprint,
            ],
        );
    }

    fn require_active(&self, run_id: &str) -> Result<Run, PipelineError> {
        self.get(run_id)
            .map_err(|e| PipelineError::Internal(e.to_string()))?
            .ok_or_else(|| PipelineError::PrereqMissing { missing_slot: "run" })
    }

    fn update_column<T: serde::Serialize>(&self, run_id: &str, column: &str, value: &T) -> Result<(), PipelineError> {
        let json = serde_json::to_string(value).map_err(|e| PipelineError::Internal(e.to_string()))?;
        let conn = self.conn.lock();
        let sql = format!("UPDATE runs SET {column} = ?1, updated_at = ?2 WHERE run_id = ?3");
        conn.execute(&sql, params![json, Utc::now().to_rfc3339(), run_id])
            .map_err(|e| PipelineError::Internal(e.to_string()))?;
        Ok(())
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
        let status: String = row.get(4)?;
        let metadata: String = row.get(5)?;
        let brand: Option<String> = row.get(6)?;
        let competitors_ten: Option<String> = row.get(7)?;
        let competitors_analyzed: Option<String> = row.get(8)?;
        let kernel: Option<String> = row.get(9)?;

        let parse_dt = |s: String| -> DateTime<Utc> { s.parse().unwrap_or_else(|_| Utc::now()) };

        Ok(Run {
            run_id: row.get(0)?,
            created_at: parse_dt(row.get(1)?),
            updated_at: parse_dt(row.get(2)?),
            expires_at: parse_dt(row.get(3)?),
            status: match status.as_str() {
                "archived" => RunStatus::Archived,
                "deleted" => RunStatus::Deleted,
                _ => RunStatus::Active,
            },
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
            brand: brand.and_then(|s| serde_json::from_str(&s).ok()),
            competitors_ten: competitors_ten.and_then(|s| serde_json::from_str(&s).ok()),
            competitors_analyzed: competitors_analyzed.and_then(|s| serde_json::from_str(&s).ok()),
            kernel: kernel.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> RunStore {
        let conn = Connection::open_in_memory().unwrap();
        RunStore::new(Arc::new(Mutex::new(conn)), 7).unwrap()
    }

    #[test]
    fn create_then_get_round_trips() {
        let store = test_store();
        let run = store.create(serde_json::json!({"brandUrl": "https://example.com"})).unwrap();
        let fetched = store.get(&run.run_id).unwrap().expect("run should exist");
        assert_eq!(fetched.run_id, run.run_id);
        assert!(fetched.brand.is_none());
    }

    #[test]
    fn created_run_id_is_prefixed() {
        let store = test_store();
        let run = store.create(serde_json::json!({})).unwrap();
        assert!(run.run_id.starts_with("run_"));
    }

    #[test]
    fn saving_competitors_without_brand_fails_prereq() {
        let store = test_store();
        let run = store.create(serde_json::json!({})).unwrap();
        let err = store.save_competitors(&run.run_id, &[]).unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_ARTIFACT_MISSING");
    }

    #[test]
    fn unknown_run_id_returns_none() {
        let store = test_store();
        assert!(store.get("does-not-exist").unwrap().is_none());
    }
}
