use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthService, Role};
use crate::entities::{admin, user};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Account service handling registration and login for both customer and
/// administrator collections.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthService>,
    event_sender: Arc<EventSender>,
}

/// Input for registering an account
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Input for logging in
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginInput {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Successful login response
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

/// Registered account summary (no password material)
#[derive(Debug, Serialize, ToSchema)]
pub struct AccountSummary {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub role: String,
}

impl AccountService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth: Arc<AuthService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            auth,
            event_sender,
        }
    }

    /// Registers a customer account.
    ///
    /// Duplicate usernames are rejected up front; the unique column closes
    /// the remaining check-then-insert race.
    #[instrument(skip(self, input))]
    pub async fn register_user(&self, input: RegisterInput) -> Result<AccountSummary, ServiceError> {
        let existing = user::Entity::find()
            .filter(user::Column::Username.eq(input.username.as_str()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest(
                "Username is already in use".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;

        let record = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(input.full_name),
            username: Set(input.username),
            password_hash: Set(password_hash),
            role: Set(Role::User.as_str().to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let record = record
            .insert(self.db.as_ref())
            .await
            .map_err(Self::map_unique_violation)?;

        self.event_sender
            .send_or_log(Event::UserRegistered(record.id))
            .await;

        info!(username = %record.username, "registered user");
        Ok(AccountSummary {
            id: record.id,
            full_name: record.full_name,
            username: record.username,
            role: record.role,
        })
    }

    /// Registers an administrator account.
    #[instrument(skip(self, input))]
    pub async fn register_admin(
        &self,
        input: RegisterInput,
    ) -> Result<AccountSummary, ServiceError> {
        let existing = admin::Entity::find()
            .filter(admin::Column::Username.eq(input.username.as_str()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(ServiceError::BadRequest(
                "Username is already in use".to_string(),
            ));
        }

        let password_hash = hash_password(&input.password)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;

        let record = admin::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(input.full_name),
            username: Set(input.username),
            password_hash: Set(password_hash),
            role: Set(Role::Admin.as_str().to_string()),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let record = record
            .insert(self.db.as_ref())
            .await
            .map_err(Self::map_unique_violation)?;

        self.event_sender
            .send_or_log(Event::AdminRegistered(record.id))
            .await;

        info!(username = %record.username, "registered admin");
        Ok(AccountSummary {
            id: record.id,
            full_name: record.full_name,
            username: record.username,
            role: record.role,
        })
    }

    /// Logs a customer in.
    ///
    /// Unknown username and wrong password produce the identical error so the
    /// response never reveals which usernames exist.
    #[instrument(skip(self, input))]
    pub async fn login_user(&self, input: LoginInput) -> Result<LoginResponse, ServiceError> {
        let record = user::Entity::find()
            .filter(user::Column::Username.eq(input.username.as_str()))
            .one(self.db.as_ref())
            .await?;

        let record = match record {
            Some(r) if verify_password(&input.password, &r.password_hash) => r,
            _ => return Err(Self::invalid_credentials()),
        };

        let token = self
            .auth
            .generate_token(record.id, Role::User)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        Ok(LoginResponse {
            token,
            id: record.id,
            username: record.username,
            role: record.role,
        })
    }

    /// Logs an administrator in with the same uniform failure behavior.
    #[instrument(skip(self, input))]
    pub async fn login_admin(&self, input: LoginInput) -> Result<LoginResponse, ServiceError> {
        let record = admin::Entity::find()
            .filter(admin::Column::Username.eq(input.username.as_str()))
            .one(self.db.as_ref())
            .await?;

        let record = match record {
            Some(r) if verify_password(&input.password, &r.password_hash) => r,
            _ => return Err(Self::invalid_credentials()),
        };

        let token = self
            .auth
            .generate_token(record.id, Role::Admin)
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        Ok(LoginResponse {
            token,
            id: record.id,
            username: record.username,
            role: record.role,
        })
    }

    /// Lists every customer account (admin surface).
    pub async fn list_users(&self) -> Result<Vec<AccountSummary>, ServiceError> {
        let users = user::Entity::find().all(self.db.as_ref()).await?;
        Ok(users
            .into_iter()
            .map(|u| AccountSummary {
                id: u.id,
                full_name: u.full_name,
                username: u.username,
                role: u.role,
            })
            .collect())
    }

    /// Updates a customer's own profile. Password changes are re-hashed.
    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
    ) -> Result<AccountSummary, ServiceError> {
        let record = user::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(new_username) = &input.username {
            if new_username != &record.username {
                let taken = user::Entity::find()
                    .filter(user::Column::Username.eq(new_username.as_str()))
                    .one(self.db.as_ref())
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::BadRequest(
                        "Username is already in use".to_string(),
                    ));
                }
            }
        }

        let mut active: user::ActiveModel = record.into();
        if let Some(full_name) = input.full_name {
            active.full_name = Set(full_name);
        }
        if let Some(username) = input.username {
            active.username = Set(username);
        }
        if let Some(password) = input.password {
            let hash =
                hash_password(&password).map_err(|e| ServiceError::HashError(e.to_string()))?;
            active.password_hash = Set(hash);
        }
        active.updated_at = Set(Utc::now());

        let record = active
            .update(self.db.as_ref())
            .await
            .map_err(Self::map_unique_violation)?;

        Ok(AccountSummary {
            id: record.id,
            full_name: record.full_name,
            username: record.username,
            role: record.role,
        })
    }

    fn invalid_credentials() -> ServiceError {
        ServiceError::Unauthorized("Invalid credentials".to_string())
    }

    /// Unique-column violations from the insert race read like the pre-check.
    fn map_unique_violation(err: sea_orm::DbErr) -> ServiceError {
        let text = err.to_string();
        if text.to_lowercase().contains("unique") {
            ServiceError::BadRequest("Username is already in use".to_string())
        } else {
            ServiceError::DatabaseError(err)
        }
    }
}

/// Input for updating a profile; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}
