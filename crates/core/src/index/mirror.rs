//! SQLite-backed local mirror of the cross-seed index.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::{CandidateHit, CandidateRecord, MirrorError, MirrorStore, SiteRecord};

const LAST_REFRESH_KEY: &str = "last_refresh";

/// SQLite-backed mirror store.
pub struct SqliteMirror {
    conn: Mutex<Connection>,
}

impl SqliteMirror {
    /// Open (and initialize) the mirror database at `path`.
    pub fn new(path: &Path) -> Result<Self, MirrorError> {
        let conn = Connection::open(path).map_err(|e| MirrorError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory mirror (useful for testing).
    pub fn in_memory() -> Result<Self, MirrorError> {
        let conn =
            Connection::open_in_memory().map_err(|e| MirrorError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), MirrorError> {
        conn.execute_batch(
            r#"
            -- Mirrored site registry (replaced wholesale on refresh)
            CREATE TABLE IF NOT EXISTS sites (
                site_id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                nickname TEXT NOT NULL DEFAULT '',
                url TEXT NOT NULL DEFAULT '',
                download_page TEXT NOT NULL DEFAULT ''
            );

            -- Cross-seed candidates, replaced per target hash batch
            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target_hash TEXT NOT NULL,
                candidate_hash TEXT NOT NULL,
                site_id INTEGER NOT NULL,
                remote_id INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_candidates_target ON candidates(target_hash);
            CREATE INDEX IF NOT EXISTS idx_candidates_hash ON candidates(candidate_hash);

            -- Single-row metadata (last refresh timestamp)
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| MirrorError::Database(e.to_string()))?;

        Ok(())
    }
}

impl MirrorStore for SqliteMirror {
    fn replace_sites(&self, sites: &[SiteRecord]) -> Result<(), MirrorError> {
        let mut conn = self.conn.lock().expect("mirror mutex poisoned");
        let tx = conn
            .transaction()
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        tx.execute("DELETE FROM sites", [])
            .map_err(|e| MirrorError::Database(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO sites (site_id, name, nickname, url, download_page)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| MirrorError::Database(e.to_string()))?;
            for site in sites {
                stmt.execute(params![
                    site.site_id,
                    site.name,
                    site.nickname,
                    site.url,
                    site.download_page
                ])
                .map_err(|e| MirrorError::Database(e.to_string()))?;
            }
        }

        tx.commit().map_err(|e| MirrorError::Database(e.to_string()))
    }

    fn sites(&self) -> Result<Vec<SiteRecord>, MirrorError> {
        let conn = self.conn.lock().expect("mirror mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT site_id, name, nickname, url, download_page FROM sites")
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(SiteRecord {
                    site_id: row.get(0)?,
                    name: row.get(1)?,
                    nickname: row.get(2)?,
                    url: row.get(3)?,
                    download_page: row.get(4)?,
                })
            })
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        let mut sites = Vec::new();
        for row in rows {
            sites.push(row.map_err(|e| MirrorError::Database(e.to_string()))?);
        }
        Ok(sites)
    }

    fn replace_candidates(
        &self,
        groups: &HashMap<String, Vec<CandidateHit>>,
    ) -> Result<(), MirrorError> {
        let mut conn = self.conn.lock().expect("mirror mutex poisoned");
        let tx = conn
            .transaction()
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        {
            let mut delete_target = tx
                .prepare("DELETE FROM candidates WHERE target_hash = ?1")
                .map_err(|e| MirrorError::Database(e.to_string()))?;
            let mut delete_hash = tx
                .prepare("DELETE FROM candidates WHERE candidate_hash = ?1")
                .map_err(|e| MirrorError::Database(e.to_string()))?;
            let mut insert = tx
                .prepare(
                    "INSERT INTO candidates (target_hash, candidate_hash, site_id, remote_id)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| MirrorError::Database(e.to_string()))?;

            for (target_hash, hits) in groups {
                delete_target
                    .execute(params![target_hash])
                    .map_err(|e| MirrorError::Database(e.to_string()))?;
                // Stale rows may reference a new candidate hash under
                // an old target; drop those too.
                for hit in hits {
                    delete_hash
                        .execute(params![hit.info_hash])
                        .map_err(|e| MirrorError::Database(e.to_string()))?;
                }
                for hit in hits {
                    insert
                        .execute(params![
                            target_hash,
                            hit.info_hash,
                            hit.site_id,
                            hit.remote_id
                        ])
                        .map_err(|e| MirrorError::Database(e.to_string()))?;
                }
            }
        }

        tx.commit().map_err(|e| MirrorError::Database(e.to_string()))
    }

    fn candidates_for(&self, hashes: &[String]) -> Result<Vec<CandidateRecord>, MirrorError> {
        let conn = self.conn.lock().expect("mirror mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT target_hash, candidate_hash, site_id, remote_id
                 FROM candidates WHERE target_hash = ?1 ORDER BY id",
            )
            .map_err(|e| MirrorError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for hash in hashes {
            let rows = stmt
                .query_map(params![hash], |row| {
                    Ok(CandidateRecord {
                        target_hash: row.get(0)?,
                        candidate_hash: row.get(1)?,
                        site_id: row.get(2)?,
                        remote_id: row.get(3)?,
                    })
                })
                .map_err(|e| MirrorError::Database(e.to_string()))?;
            for row in rows {
                records.push(row.map_err(|e| MirrorError::Database(e.to_string()))?);
            }
        }
        Ok(records)
    }

    fn last_refresh(&self) -> Result<Option<i64>, MirrorError> {
        let conn = self.conn.lock().expect("mirror mutex poisoned");
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![LAST_REFRESH_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| {
                if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                    Ok(None)
                } else {
                    Err(MirrorError::Database(e.to_string()))
                }
            })?;

        Ok(value.and_then(|v| v.parse().ok()))
    }

    fn set_last_refresh(&self, timestamp: i64) -> Result<(), MirrorError> {
        let conn = self.conn.lock().expect("mirror mutex poisoned");
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_REFRESH_KEY, timestamp.to_string()],
        )
        .map_err(|e| MirrorError::Database(e.to_string()))?;
        Ok(())
    }
}
