use async_trait::async_trait;
use rusqlite::params;

use crate::db::models::OrphanedAsset;
use crate::db::{now_timestamp, RepositoryError};
use crate::state::DbPool;

/// Journal of media assets whose deletion failed at the host.
#[async_trait]
pub trait OrphanRepository: Send + Sync {
    /// Idempotent: recording the same asset twice keeps the first entry.
    async fn record(&self, asset_id: &str, reason: &str) -> Result<(), RepositoryError>;

    async fn list(&self) -> Result<Vec<OrphanedAsset>, RepositoryError>;

    async fn remove(&self, asset_id: &str) -> Result<(), RepositoryError>;
}

pub struct SqliteOrphanRepository {
    pool: DbPool,
}

impl SqliteOrphanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrphanRepository for SqliteOrphanRepository {
    async fn record(&self, asset_id: &str, reason: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO orphaned_assets (asset_id, reason, created_at) VALUES (?1, ?2, ?3)",
            params![asset_id, reason, now_timestamp()],
        )?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<OrphanedAsset>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT asset_id, reason, created_at FROM orphaned_assets ORDER BY created_at",
        )?;
        let orphans = stmt
            .query_map([], |row| {
                Ok(OrphanedAsset {
                    asset_id: row.get(0)?,
                    reason: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orphans)
    }

    async fn remove(&self, asset_id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM orphaned_assets WHERE asset_id = ?1",
            params![asset_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;

    #[tokio::test]
    async fn record_list_remove() {
        let (pool, _tmp) = migrated_pool();
        let repo = SqliteOrphanRepository::new(pool);

        repo.record("a1", "timeout").await.unwrap();
        repo.record("a1", "second failure").await.unwrap();
        repo.record("a2", "502").await.unwrap();

        let orphans = repo.list().await.unwrap();
        assert_eq!(orphans.len(), 2);
        assert_eq!(orphans[0].asset_id, "a1");
        assert_eq!(orphans[0].reason, "timeout");

        repo.remove("a1").await.unwrap();
        let orphans = repo.list().await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].asset_id, "a2");
    }
}
