use crate::{
    cache::TtlStore,
    db::DbPool,
    entities::staff::{self, StaffRole},
    errors::ServiceError,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::Rng;
use sea_orm::{ActiveEnum, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

const CODE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StaffResponse {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub staff: StaffResponse,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateStaffRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Display name is required"))]
    pub display_name: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub exp: i64,
}

pub(crate) fn parse_role(raw: &str) -> Result<StaffRole, ServiceError> {
    match raw.to_ascii_lowercase().as_str() {
        "manager" => Ok(StaffRole::Manager),
        "waiter" => Ok(StaffRole::Waiter),
        "receptionist" => Ok(StaffRole::Receptionist),
        "chef" => Ok(StaffRole::Chef),
        "cashier" => Ok(StaffRole::Cashier),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown staff role: {}",
            other
        ))),
    }
}

/// Staff login and QR-session one-time codes.
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DbPool>,
    jwt_secret: String,
    jwt_expiry_secs: u64,
    codes: TtlStore,
}

impl AuthService {
    pub fn new(db: Arc<DbPool>, jwt_secret: String, jwt_expiry_secs: u64) -> Self {
        Self {
            db,
            jwt_secret,
            jwt_expiry_secs,
            codes: TtlStore::new(),
        }
    }

    /// Verifies credentials and issues a JWT. Unknown user, wrong
    /// password and deactivated account all fail with the same message.
    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        request.validate()?;

        let auth_failed = || ServiceError::AuthError("Invalid username or password".to_string());

        let staff = staff::Entity::find()
            .filter(staff::Column::Username.eq(request.username.clone()))
            .one(&*self.db)
            .await?
            .ok_or_else(auth_failed)?;

        if !staff.active {
            warn!(staff_id = %staff.id, "login attempt on inactive account");
            return Err(auth_failed());
        }

        let parsed = PasswordHash::new(&staff.password_hash)
            .map_err(|e| ServiceError::InternalError(format!("corrupt password hash: {}", e)))?;
        if Argon2::default()
            .verify_password(request.password.as_bytes(), &parsed)
            .is_err()
        {
            return Err(auth_failed());
        }

        let claims = Claims {
            sub: staff.id,
            role: staff.role.to_value(),
            exp: Utc::now().timestamp() + self.jwt_expiry_secs as i64,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))?;

        info!(staff_id = %staff.id, "staff logged in");
        Ok(LoginResponse {
            token,
            staff: StaffResponse {
                id: staff.id,
                username: staff.username,
                display_name: staff.display_name,
                role: staff.role.to_value(),
            },
        })
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    pub async fn create_staff(
        &self,
        request: CreateStaffRequest,
    ) -> Result<StaffResponse, ServiceError> {
        request.validate()?;
        let role = parse_role(&request.role)?;

        let existing = staff::Entity::find()
            .filter(staff::Column::Username.eq(request.username.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is taken",
                request.username
            )));
        }

        let model = staff::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(request.username),
            password_hash: Set(hash_password(&request.password)?),
            display_name: Set(request.display_name),
            role: Set(role),
            active: Set(true),
            created_at: Set(Utc::now()),
        };
        let created = model.insert(&*self.db).await?;

        Ok(StaffResponse {
            id: created.id,
            username: created.username,
            display_name: created.display_name,
            role: created.role.to_value(),
        })
    }

    /// Issues a short-lived 6-digit code bound to a session key.
    pub fn issue_code(&self, session_key: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.codes
            .set(session_key, code.clone(), Some(CODE_TTL));
        code
    }

    /// Verifies and consumes a one-time code.
    pub fn verify_code(&self, session_key: &str, code: &str) -> bool {
        match self.codes.get(session_key) {
            Some(stored) if stored == code => {
                self.codes.remove(session_key);
                true
            }
            _ => false,
        }
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"correct horse battery staple", &parsed)
            .is_ok());
        assert!(Argon2::default()
            .verify_password(b"wrong password", &parsed)
            .is_err());
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(parse_role("Waiter").unwrap(), StaffRole::Waiter);
        assert_eq!(parse_role("CHEF").unwrap(), StaffRole::Chef);
        assert!(parse_role("astronaut").is_err());
    }

    #[test]
    fn one_time_codes_verify_once() {
        let db = Arc::new(sea_orm::DatabaseConnection::Disconnected);
        let auth = AuthService::new(db, "secret".repeat(8), 3600);

        let code = auth.issue_code("qr:table-5");
        assert_eq!(code.len(), 6);
        assert!(!auth.verify_code("qr:table-5", "000000") || code == "000000");
        let fresh = auth.issue_code("qr:table-5");
        assert!(auth.verify_code("qr:table-5", &fresh));
        // Consumed on success.
        assert!(!auth.verify_code("qr:table-5", &fresh));
    }
}
