use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::user::Role;
use crate::entities::{Admin, User};
use crate::errors::ServiceError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

/// JWT claims carried by the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, resolved from a validated token. Admin accounts are
/// looked up before customer accounts so a shared id can never downgrade an
/// admin session.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role.satisfies(Role::Admin)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Insufficient permissions")]
    Forbidden,
    #[error("Internal error")]
    Internal,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::MissingToken | AuthError::InvalidToken | AuthError::AccountDisabled => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "success": false,
            "error": status.canonical_reason().unwrap_or("Error"),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Token issuing, password hashing and principal resolution.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    jwt_secret: String,
    jwt_expiration_secs: i64,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, jwt_secret: String, jwt_expiration_secs: i64) -> Self {
        Self {
            db,
            jwt_secret,
            jwt_expiration_secs,
        }
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.jwt_expiration_secs
    }

    pub fn hash_password(&self, password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ServiceError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ServiceError> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn generate_token(
        &self,
        id: Uuid,
        email: &str,
        role: Role,
    ) -> Result<String, ServiceError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: id.to_string(),
            email: email.to_string(),
            role: role.as_str().to_string(),
            iat: now,
            exp: now + self.jwt_expiration_secs,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::JwtError(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
    }

    /// Resolves the account behind a validated claim set. Admins are checked
    /// first, then customers.
    #[instrument(skip(self, claims), fields(sub = %claims.sub))]
    pub async fn resolve_principal(&self, claims: &Claims) -> Result<Principal, AuthError> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if let Some(admin) = Admin::find_by_id(id).one(self.db.as_ref()).await.map_err(|e| {
            warn!("admin lookup failed: {}", e);
            AuthError::Internal
        })? {
            if !admin.is_active {
                return Err(AuthError::AccountDisabled);
            }
            return Ok(Principal {
                id: admin.id,
                email: admin.email,
                role: admin.role,
            });
        }

        let user = User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| {
                warn!("user lookup failed: {}", e);
                AuthError::Internal
            })?
            .ok_or(AuthError::InvalidToken)?;

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(Principal {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

/// Pulls the session token from the Authorization header or session cookie.
fn extract_token(parts_headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(value) = parts_headers.get(header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    let cookies = parts_headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in cookies.split(';') {
        let pair = pair.trim();
        if let Some(value) = pair.strip_prefix(&format!("{}=", SESSION_COOKIE)) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let claims = state.auth.validate_token(&token)?;
    let principal = state.auth.resolve_principal(&claims).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

async fn role_middleware(
    State((state, required)): State<(AppState, Role)>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(req.headers()).ok_or(AuthError::MissingToken)?;
    let claims = state.auth.validate_token(&token)?;
    let principal = state.auth.resolve_principal(&claims).await?;
    if !principal.role.satisfies(required) {
        return Err(AuthError::Forbidden);
    }
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Attaches authentication layers to a router.
pub trait AuthRouterExt {
    /// Requires a valid session; inserts the [`Principal`] into extensions.
    fn with_auth(self, state: AppState) -> Self;
    /// Requires a valid session with at least the given role.
    fn with_role(self, state: AppState, role: Role) -> Self;
}

impl AuthRouterExt for Router<AppState> {
    fn with_auth(self, state: AppState) -> Self {
        self.layer(middleware::from_fn_with_state(state, auth_middleware))
    }

    fn with_role(self, state: AppState, role: Role) -> Self {
        self.layer(middleware::from_fn_with_state(
            (state, role),
            role_middleware,
        ))
    }
}

#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}

/// Builds the Set-Cookie value for a fresh session.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Builds a Set-Cookie value that expires the session immediately.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use sea_orm::DatabaseConnection;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(DatabaseConnection::Disconnected),
            "test-secret-value-long-enough-for-hs256".to_string(),
            3600,
        )
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let auth = service();
        let hash = auth.hash_password("hunter2!").unwrap();
        assert_ne!(hash, "hunter2!");
        assert!(auth.verify_password("hunter2!", &hash).unwrap());
        assert!(!auth.verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn token_round_trips_claims() {
        let auth = service();
        let id = Uuid::new_v4();
        let token = auth.generate_token(id, "a@example.com", Role::User).unwrap();
        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.email, "a@example.com");
        assert_eq!(claims.role, "user");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service();
        let token = auth
            .generate_token(Uuid::new_v4(), "a@example.com", Role::User)
            .unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(auth.validate_token(&tampered).is_err());
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn token_from_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "theme=dark; session=tok123; other=1".parse().unwrap(),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("tok123"));
    }

    #[test]
    fn missing_token_is_none() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_none());
    }

    #[test]
    fn session_cookie_flags() {
        let c = session_cookie("tok", 604800, true);
        assert!(c.contains("HttpOnly"));
        assert!(c.contains("SameSite=Lax"));
        assert!(c.contains("Secure"));
        assert!(c.contains("Max-Age=604800"));

        let dev = session_cookie("tok", 60, false);
        assert!(!dev.contains("Secure"));

        let cleared = clear_session_cookie(false);
        assert!(cleared.contains("Max-Age=0"));
    }
}
