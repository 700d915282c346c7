use async_trait::async_trait;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::User;
use crate::db::RepositoryError;
use crate::state::DbPool;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, image, image_id, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Overwrite every mutable column of an existing user.
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;
}

pub struct SqliteUserRepository {
    pool: DbPool,
}

impl SqliteUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn find_one(&self, column: &str, value: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
        let user = conn
            .query_row(&sql, params![value], row_to_user)
            .optional()?;
        Ok(user)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        image: row.get(4)?,
        image_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Name the unique column a failed write collided with.
fn user_conflict(err: rusqlite::Error) -> RepositoryError {
    let message = match &err {
        rusqlite::Error::SqliteFailure(_, Some(detail)) if detail.contains("users.username") => {
            "Username already taken"
        }
        _ => "User already exists",
    };
    RepositoryError::unique_as_conflict(err, message)
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, user: &User) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, image, image_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.image,
                user.image_id,
                user.created_at,
                user.updated_at
            ],
        )
        .map_err(user_conflict)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("id", id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("email", email)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("username", username)
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn
            .execute(
                "UPDATE users
                 SET username = ?2, email = ?3, password_hash = ?4, image = ?5, image_id = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password_hash,
                    user.image,
                    user.image_id,
                    user.updated_at
                ],
            )
            .map_err(user_conflict)?;

        if changed == 0 {
            return Err(RepositoryError::NotFound("User not found".into()));
        }
        Ok(())
    }
}
