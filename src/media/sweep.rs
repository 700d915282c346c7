use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{DynMediaRelay, MediaRelay};
use crate::db::{OrphanRepository, RepositoryError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub attempted: usize,
    pub removed: usize,
}

/// Try once to delete every journalled orphan; drop the ones that went
/// through.
pub async fn sweep_orphans(
    orphans: &dyn OrphanRepository,
    relay: &dyn MediaRelay,
) -> Result<SweepReport, RepositoryError> {
    let mut report = SweepReport::default();

    for orphan in orphans.list().await? {
        report.attempted += 1;
        match relay.delete(&orphan.asset_id).await {
            Ok(()) => {
                orphans.remove(&orphan.asset_id).await?;
                report.removed += 1;
            }
            Err(e) => {
                tracing::debug!("Orphan {} still not deletable: {}", orphan.asset_id, e);
            }
        }
    }

    Ok(report)
}

pub fn spawn_sweeper(
    orphans: Arc<dyn OrphanRepository>,
    relay: DynMediaRelay,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match sweep_orphans(orphans.as_ref(), relay.as_ref()).await {
                Ok(report) if report.attempted > 0 => {
                    tracing::info!(
                        "Orphan sweep removed {} of {} assets",
                        report.removed,
                        report.attempted
                    );
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Orphan sweep failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_pool;
    use crate::db::SqliteOrphanRepository;
    use crate::media::{MediaError, StoredAsset};
    use async_trait::async_trait;

    /// Deletes succeed only for ids starting with "ok".
    struct PickyRelay;

    #[async_trait]
    impl MediaRelay for PickyRelay {
        fn validate(&self, _payload: &str) -> Result<(), MediaError> {
            Ok(())
        }

        async fn store(&self, _payload: &str) -> Result<StoredAsset, MediaError> {
            unreachable!("sweep never uploads")
        }

        async fn delete(&self, asset_id: &str) -> Result<(), MediaError> {
            if asset_id.starts_with("ok") {
                Ok(())
            } else {
                Err(MediaError::Api {
                    status: 503,
                    message: "unavailable".into(),
                })
            }
        }
    }

    #[tokio::test]
    async fn removes_only_successful_deletes() {
        let (pool, _tmp) = migrated_pool();
        let repo = SqliteOrphanRepository::new(pool);
        repo.record("ok-1", "timeout").await.unwrap();
        repo.record("stuck-1", "timeout").await.unwrap();
        repo.record("ok-2", "timeout").await.unwrap();

        let report = sweep_orphans(&repo, &PickyRelay).await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                attempted: 3,
                removed: 2
            }
        );

        let left: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.asset_id)
            .collect();
        assert_eq!(left, vec!["stuck-1".to_string()]);
    }

    #[tokio::test]
    async fn empty_journal_is_a_noop() {
        let (pool, _tmp) = migrated_pool();
        let repo = SqliteOrphanRepository::new(pool);
        let report = sweep_orphans(&repo, &PickyRelay).await.unwrap();
        assert_eq!(report, SweepReport::default());
    }
}
