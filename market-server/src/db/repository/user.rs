//! User Repository

use std::time::Duration;

use surrealdb::RecordId;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

use super::{BaseRepository, RepoError, RepoResult, make_record_id};
use crate::db::models::{Role, User, UserContact};

const USER_TABLE: &str = "user";

#[derive(Clone)]
pub struct UserRepository {
    base: BaseRepository,
}

impl UserRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub fn with_timeout(db: Surreal<Db>, timeout: Duration) -> Self {
        Self {
            base: BaseRepository::with_timeout(db, timeout),
        }
    }

    /// Create a user. The unique email index turns duplicate registrations
    /// into a `Duplicate` error.
    pub async fn create(
        &self,
        name: String,
        email: String,
        password_hash: String,
        role: Role,
        phone: Option<String>,
        address: Option<String>,
    ) -> RepoResult<User> {
        let email = email.trim().to_lowercase();
        self.base
            .bounded("user.create", async {
                let mut result = self
                    .base
                    .db()
                    .query(
                        "CREATE user SET name = $name, email = $email, \
                         password_hash = $password_hash, role = $role, \
                         phone = $phone, address = $address, created_at = $now",
                    )
                    .bind(("name", name))
                    .bind(("email", email.clone()))
                    .bind(("password_hash", password_hash))
                    .bind(("role", role.as_str()))
                    .bind(("phone", phone))
                    .bind(("address", address))
                    .bind(("now", chrono::Utc::now().timestamp_millis()))
                    .await?;

                let users: Vec<User> = result.take(0).map_err(|e| {
                    let msg = e.to_string();
                    if msg.contains("user_email") {
                        RepoError::Duplicate(format!("Email {email} is already registered"))
                    } else {
                        RepoError::Database(msg)
                    }
                })?;

                users
                    .into_iter()
                    .next()
                    .ok_or_else(|| RepoError::Database("Failed to create user".to_string()))
            })
            .await
    }

    pub async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = email.trim().to_lowercase();
        self.base
            .bounded("user.find_by_email", async {
                let mut result = self
                    .base
                    .db()
                    .query("SELECT * FROM user WHERE email = $email LIMIT 1")
                    .bind(("email", email))
                    .await?;
                let user: Option<User> = result.take(0)?;
                Ok(user)
            })
            .await
    }

    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<User>> {
        let record = make_record_id(USER_TABLE, id);
        self.base
            .bounded("user.find_by_id", async {
                let user: Option<User> = self
                    .base
                    .db()
                    .select((USER_TABLE, record.key().to_string()))
                    .await?;
                Ok(user)
            })
            .await
    }

    /// Contact projection used by the farmer dashboard (never exposes credentials)
    pub async fn contact_by_id(&self, id: &RecordId) -> RepoResult<Option<UserContact>> {
        self.base
            .bounded("user.contact_by_id", async {
                let mut result = self
                    .base
                    .db()
                    .query("SELECT id, name, email, phone, address FROM $user")
                    .bind(("user", id.clone()))
                    .await?;
                let contacts: Vec<UserContact> = result.take(0)?;
                Ok(contacts.into_iter().next())
            })
            .await
    }
}
