//! User repository.
//!
//! Users are owned by the authentication service; this repository only
//! registers and looks them up so accounts and loans have an owner row.

use kassa_shared::types::UserId;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};

use crate::entities::users;

/// User repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<users::Model>, DbErr> {
        users::Entity::find_by_id(id.into_inner()).one(&self.db).await
    }

    /// Creates a new user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, username: &str, email: &str) -> Result<users::Model, DbErr> {
        let user = users::ActiveModel {
            id: Set(UserId::new().into_inner()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            created_at: Set(chrono::Utc::now().into()),
        };

        user.insert(&self.db).await
    }
}
