/*!
 * # Authentication and Authorization Module
 *
 * JWT (HS256) authentication with role-based access control. Tokens embed the
 * principal id and role; the middleware re-loads the principal from the
 * matching collection on every request, so a deleted account is locked out
 * immediately even with a live token.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{admin, user};
use crate::AppState;

/// Principal role, one per collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id
    pub sub: String,
    /// Principal role ("user" or "admin"), selects the collection to re-load from
    pub role: String,
    /// Issued at time
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

/// Authenticated principal attached to request extensions by the middleware
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Authentication errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Principal not found")]
    PrincipalNotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Unauthorized".to_string(),
            ),
            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Unauthorized".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Unauthorized".to_string(),
            ),
            // A token for a deleted account reads the same as a bad token
            Self::PrincipalNotFound => (
                StatusCode::UNAUTHORIZED,
                "AUTH_PRINCIPAL_NOT_FOUND",
                "Unauthorized".to_string(),
            ),
            Self::AccessDenied => (
                StatusCode::FORBIDDEN,
                "AUTH_ACCESS_DENIED",
                "Access denied".to_string(),
            ),
            Self::TokenCreation(_) | Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_secret: String,
    expiration_secs: usize,
}

impl AuthService {
    pub fn new(jwt_secret: String, expiration_secs: usize) -> Self {
        Self {
            jwt_secret,
            expiration_secs,
        }
    }

    /// Generate a JWT token for a principal
    pub fn generate_token(&self, principal_id: Uuid, role: Role) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: principal_id.to_string(),
            role: role.as_str().to_string(),
            iat: now,
            exp: now + self.expiration_secs as i64,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })
    }
}

/// Hashes a password with argon2 and a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::TokenCreation(format!("password hashing failed: {}", e)))
}

/// Verifies a password against a stored argon2 hash
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let headers = request.headers().clone();

    match extract_auth_from_headers(&headers, &state).await {
        Ok(current_user) => {
            request.extensions_mut().insert(current_user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extract and verify authentication info from request headers.
///
/// Re-loads the principal from the collection named in the token's role claim.
async fn extract_auth_from_headers(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<CurrentUser, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    if !auth_header.starts_with("Bearer ") {
        return Err(AuthError::MissingAuth);
    }

    let token = auth_header.trim_start_matches("Bearer ").trim();
    let claims = state.services.auth.validate_token(token)?;

    let principal_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
    let role = Role::parse(&claims.role).ok_or(AuthError::InvalidToken)?;

    match role {
        Role::User => {
            let record = user::Entity::find_by_id(principal_id)
                .one(state.db.as_ref())
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?
                .ok_or(AuthError::PrincipalNotFound)?;

            Ok(CurrentUser {
                id: record.id,
                username: record.username,
                full_name: record.full_name,
                role: Role::User,
            })
        }
        Role::Admin => {
            let record = admin::Entity::find_by_id(principal_id)
                .one(state.db.as_ref())
                .await
                .map_err(|e| AuthError::DatabaseError(e.to_string()))?
                .ok_or(AuthError::PrincipalNotFound)?;

            Ok(CurrentUser {
                id: record.id,
                username: record.username,
                full_name: record.full_name,
                role: Role::Admin,
            })
        }
    }
}

/// Role guard middleware, parameterized by the allowed-role list.
///
/// Runs after `auth_middleware`, which inserts `CurrentUser`.
pub async fn require_roles(
    State(allowed): State<Vec<Role>>,
    request: Request,
    next: Next,
) -> Response {
    let current_user = match request.extensions().get::<CurrentUser>() {
        Some(user) => user,
        None => return AuthError::MissingAuth.into_response(),
    };

    if !allowed.contains(&current_user.role) {
        debug!(
            username = %current_user.username,
            role = current_user.role.as_str(),
            "role guard rejected request"
        );
        return AuthError::AccessDenied.into_response();
    }

    next.run(request).await
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    /// Requires a valid token; inserts `CurrentUser` into extensions.
    fn with_auth(self, state: AppState) -> Self;
    /// Requires a valid token AND one of the allowed roles.
    fn with_roles(self, state: AppState, roles: &[Role]) -> Self;
}

impl AuthRouterExt for axum::Router<AppState> {
    fn with_auth(self, state: AppState) -> Self {
        self.layer(axum::middleware::from_fn_with_state(state, auth_middleware))
    }

    fn with_roles(self, state: AppState, roles: &[Role]) -> Self {
        // Auth layer is added last so it runs first and the guard sees CurrentUser
        self.layer(axum::middleware::from_fn_with_state(
            roles.to_vec(),
            require_roles,
        ))
        .with_auth(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit_test_signing_key_that_is_definitely_longer_than_sixty_four_characters";

    #[test]
    fn token_round_trip_preserves_claims() {
        let auth = AuthService::new(SECRET.into(), 3600);
        let id = Uuid::new_v4();

        let token = auth.generate_token(id, Role::Admin).unwrap();
        let claims = auth.validate_token(&token).unwrap();

        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, "admin");
        assert!(claims.exp - claims.iat == 3600);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = AuthService::new(SECRET.into(), 3600);
        let other = AuthService::new(
            "a_completely_different_signing_key_that_is_also_longer_than_sixty_four_chars".into(),
            3600,
        );

        let token = auth.generate_token(Uuid::new_v4(), Role::User).unwrap();
        assert!(matches!(
            other.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("wrong-password", &hash));
        assert!(!verify_password("hunter2hunter2", "not-a-phc-string"));
    }

    #[test]
    fn role_parsing() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("superuser"), None);
    }
}
