//! Cache manifest: artifact path -> source path

use crate::{init_pool, migrate, DbError, DbPool, Result};
use rusqlite::params;
use serde::Serialize;
use std::path::Path;

/// File name of the manifest database inside a cache root
pub const MANIFEST_FILE_NAME: &str = "manifest.db";

/// One recorded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRecord {
    /// Artifact path relative to the cache root, '/'-separated
    pub artifact: String,
    /// Normalized absolute source path
    pub source: String,
    /// Unix seconds of the last (re)generation
    pub recorded_at: i64,
}

/// SQLite-backed manifest living at `<cache root>/manifest.db`
#[derive(Clone)]
pub struct Manifest {
    pool: DbPool,
}

impl Manifest {
    /// Open or create the manifest for a cache root
    pub fn open(cache_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_root)?;
        let pool = init_pool(&cache_root.join(MANIFEST_FILE_NAME))?;
        migrate(&pool)?;
        tracing::debug!("Manifest opened at {:?}", cache_root);
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>> {
        self.pool.get().map_err(|e| DbError::Pool(e.to_string()))
    }

    /// Record that `artifact` was derived from `source`.
    ///
    /// Re-recording the same pair refreshes the timestamp. An artifact that
    /// already belongs to a different source is a key collision and is
    /// rejected; the existing row is left untouched.
    pub fn record(&self, artifact: &str, source: &str) -> Result<()> {
        let conn = self.conn()?;

        let changed = conn.execute(
            r#"
            INSERT INTO cache_entries (artifact, source)
            VALUES (?1, ?2)
            ON CONFLICT(artifact) DO UPDATE SET
                recorded_at = strftime('%s', 'now')
            WHERE cache_entries.source = excluded.source
            "#,
            params![artifact, source],
        )?;

        if changed == 0 {
            let existing: String = conn.query_row(
                "SELECT source FROM cache_entries WHERE artifact = ?1",
                params![artifact],
                |row| row.get(0),
            )?;
            return Err(DbError::Conflict {
                key: artifact.to_string(),
                existing,
            });
        }

        Ok(())
    }

    /// Remove an artifact's row; returns whether one existed
    pub fn remove(&self, artifact: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE artifact = ?1",
            params![artifact],
        )?;
        Ok(removed > 0)
    }

    /// Every recorded artifact
    pub fn all(&self) -> Result<Vec<ManifestRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT artifact, source, recorded_at FROM cache_entries ORDER BY artifact",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(ManifestRecord {
                    artifact: row.get(0)?,
                    source: row.get(1)?,
                    recorded_at: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Drop every row; returns how many there were
    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM cache_entries", [])?)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(manifest: &Manifest, artifact: &str) -> Option<String> {
        manifest
            .all()
            .unwrap()
            .into_iter()
            .find(|r| r.artifact == artifact)
            .map(|r| r.source)
    }

    fn open_temp() -> (tempfile::TempDir, Manifest) {
        let temp = tempfile::tempdir().unwrap();
        let manifest = Manifest::open(temp.path()).unwrap();
        (temp, manifest)
    }

    #[test]
    fn test_manifest_starts_empty() {
        let (_temp, manifest) = open_temp();
        assert!(manifest.is_empty().unwrap());
        assert!(manifest.all().unwrap().is_empty());
    }

    #[test]
    fn test_record_and_lookup() {
        let (_temp, manifest) = open_temp();
        manifest.record("256/ab/abcd.jpg", "/photos/a.jpg").unwrap();

        assert_eq!(source(&manifest, "256/ab/abcd.jpg").as_deref(), Some("/photos/a.jpg"));
        assert_eq!(source(&manifest, "256/zz/none.jpg"), None);
        assert_eq!(manifest.len().unwrap(), 1);
    }

    #[test]
    fn test_rerecord_same_source_is_ok() {
        let (_temp, manifest) = open_temp();
        manifest.record("256/ab/abcd.jpg", "/photos/a.jpg").unwrap();
        manifest.record("256/ab/abcd.jpg", "/photos/a.jpg").unwrap();
        assert_eq!(manifest.len().unwrap(), 1);
    }

    #[test]
    fn test_record_conflict_keeps_original() {
        let (_temp, manifest) = open_temp();
        manifest.record("256/ab/abcd.jpg", "/photos/a.jpg").unwrap();

        let err = manifest.record("256/ab/abcd.jpg", "/photos/b.jpg").unwrap_err();
        assert!(matches!(err, DbError::Conflict { ref existing, .. } if existing == "/photos/a.jpg"));
        assert_eq!(source(&manifest, "256/ab/abcd.jpg").as_deref(), Some("/photos/a.jpg"));
    }

    #[test]
    fn test_remove_and_clear() {
        let (_temp, manifest) = open_temp();
        manifest.record("256/aa/1.jpg", "/p/1.jpg").unwrap();
        manifest.record("256/bb/2.jpg", "/p/2.jpg").unwrap();
        manifest.record("128/bb/2.jpg", "/p/2.jpg").unwrap();

        assert!(manifest.remove("256/aa/1.jpg").unwrap());
        assert!(!manifest.remove("256/aa/1.jpg").unwrap());
        assert_eq!(manifest.len().unwrap(), 2);

        assert_eq!(manifest.clear().unwrap(), 2);
        assert!(manifest.is_empty().unwrap());
    }

    #[test]
    fn test_manifest_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        {
            let manifest = Manifest::open(temp.path()).unwrap();
            manifest.record("256/aa/1.jpg", "/p/1.jpg").unwrap();
        }
        let manifest = Manifest::open(temp.path()).unwrap();
        let all = manifest.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source, "/p/1.jpg");
    }
}
