use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::session::SessionKeys;
use crate::config::Config;
use crate::db::{
    OrphanRepository, ProductRepository, SqliteOrphanRepository, SqliteProductRepository,
    SqliteUserRepository, UserRepository,
};
use crate::media::DynMediaRelay;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionKeys,
    pub users: Arc<dyn UserRepository>,
    pub products: Arc<dyn ProductRepository>,
    pub orphans: Arc<dyn OrphanRepository>,
    pub media: DynMediaRelay,
}

impl AppState {
    /// Wire the SQLite repositories over `pool`.
    pub fn new(pool: DbPool, config: Config, sessions: SessionKeys, media: DynMediaRelay) -> Self {
        Self {
            config,
            sessions,
            users: Arc::new(SqliteUserRepository::new(pool.clone())),
            products: Arc::new(SqliteProductRepository::new(pool.clone())),
            orphans: Arc::new(SqliteOrphanRepository::new(pool)),
            media,
        }
    }
}
