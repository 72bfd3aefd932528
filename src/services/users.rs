//! Local mirror of the identity provider's user directory

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::LoanQuery,
        user::{NewUser, UpdateUser, User, UserQuery},
    },
    repository::{Store, StoreTx},
};

/// Resolve a user inside an ongoing transaction
pub(crate) async fn require_user(tx: &mut dyn StoreTx, user_id: i32) -> AppResult<User> {
    tx.get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
}

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn Store>,
}

impl UsersService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, user_id: i32) -> AppResult<User> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await
    }

    /// List users; a numeric search looks the id up, any other text matches
    /// name or email
    pub async fn list_users(&self, query: &UserQuery) -> AppResult<Vec<User>> {
        let mut tx = self.store.begin().await?;
        let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        if let Some(id) = search.and_then(|s| s.parse::<i32>().ok()) {
            return Ok(tx.get_user(id).await?.into_iter().collect());
        }
        tx.list_users(search).await
    }

    /// Register a user known to the identity provider
    pub async fn create_user(&self, user: NewUser) -> AppResult<User> {
        if user.name.trim().is_empty() {
            return Err(AppError::Validation("User name must not be empty".to_string()));
        }
        let mut tx = self.store.begin().await?;
        let created = tx.insert_user(&user).await?;
        tx.commit().await?;
        tracing::info!(user_id = created.id, "User registered");
        Ok(created)
    }

    /// Change name, email or roles
    pub async fn update_user(&self, user_id: i32, update: UpdateUser) -> AppResult<User> {
        update.validate()?;
        let mut tx = self.store.begin().await?;
        let mut user = require_user(tx.as_mut(), user_id).await?;
        user.apply(update);
        tx.update_user(&user).await?;
        tx.commit().await?;
        tracing::info!(user_id, roles = ?user.roles, "User updated");
        Ok(user)
    }

    /// Remove a user with nothing on loan and no unpaid fine
    pub async fn delete_user(&self, user_id: i32) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        require_user(tx.as_mut(), user_id).await?;

        let active = tx
            .list_loans(&LoanQuery {
                user_id: Some(user_id),
                status: Some(LoanStatus::Active),
                ..Default::default()
            })
            .await?;
        if !active.is_empty() {
            return Err(AppError::InvalidState(format!(
                "User {} has {} active loans",
                user_id,
                active.len()
            )));
        }
        if tx.count_pending_fines(user_id).await? > 0 {
            return Err(AppError::InvalidState(format!("User {} has pending fines", user_id)));
        }

        tx.delete_user(user_id).await?;
        tx.commit().await?;
        tracing::info!(user_id, "User deleted");
        Ok(())
    }
}
