//! Authentication service for user registration, login, and token management

use base64::{engine::general_purpose::STANDARD, Engine};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shared::User;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Concurrent registrations for one email meet at the unique index
fn duplicate_email(err: sqlx::Error) -> AppError {
    AppError::from_unique_violation(err, "email", "An account with this email already exists")
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    db: PgPool,
    tokens: TokenIssuer,
}

/// Input for registering a new account
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(custom = "crate::validation::email")]
    pub email: String,
    #[validate(custom = "crate::validation::password")]
    pub password: String,
    #[validate(custom = "crate::validation::display_name")]
    pub display_name: String,
}

/// Response after successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication tokens
#[derive(Debug, Serialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// User info from database
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    display_name: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            created_at: row.created_at,
        }
    }
}

/// Signs access tokens and derives refresh-token hashes
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    access_token_expiry: i64,
    refresh_token_expiry: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, access_token_expiry: i64, refresh_token_expiry: i64) -> Self {
        Self {
            secret: secret.to_string(),
            access_token_expiry,
            refresh_token_expiry,
        }
    }

    /// Issue an access token and a fresh random refresh token
    pub fn issue(&self, user_id: Uuid, email: &str) -> AppResult<AuthTokens> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::seconds(self.access_token_expiry)).timestamp(),
            iat: now.timestamp(),
        };

        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(AuthTokens {
            access_token,
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_expiry,
        })
    }

    /// Keyed hash under which a refresh token is stored
    pub fn hash_refresh_token(&self, token: &str) -> AppResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| AppError::Internal(format!("HMAC key error: {}", e)))?;
        mac.update(token.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    pub fn refresh_expires_at(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.refresh_token_expiry)
    }
}

/// Decode and validate an HS256 access token
pub fn decode_claims(token: &str, secret: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            tokens: TokenIssuer::new(
                &config.jwt.secret,
                config.jwt.access_token_expiry,
                config.jwt.refresh_token_expiry,
            ),
        }
    }

    /// Register a new account with an empty profile
    pub async fn register(&self, input: RegisterInput) -> AppResult<RegisterResponse> {
        input.validate()?;

        let email = normalize_email(&input.email);

        // Hash password
        let password_hash = hash(&input.password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (email, password_hash, display_name)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, display_name, created_at
            "#,
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(input.display_name.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_email)?;

        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1)")
            .bind(row.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %row.id, "Registered user");

        let tokens = self.tokens.issue(row.id, &row.email)?;
        self.store_refresh_token(row.id, &tokens.refresh_token).await?;

        Ok(RegisterResponse {
            user: row.into(),
            tokens,
        })
    }

    /// Authenticate user with email and password
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthTokens> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, display_name, created_at FROM users WHERE email = $1",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

        let valid = verify(password, &user.password_hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.tokens.issue(user.id, &user.email)?;
        self.store_refresh_token(user.id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Rotate a refresh token into a new token pair
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthTokens> {
        let token_hash = self.tokens.hash_refresh_token(refresh_token)?;

        // Revoke and fetch in one statement so a token can only be used once
        let (user_id, email) = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            UPDATE refresh_tokens rt
            SET revoked_at = NOW()
            FROM users u
            WHERE rt.token_hash = $1
              AND u.id = rt.user_id
              AND rt.expires_at > NOW()
              AND rt.revoked_at IS NULL
            RETURNING rt.user_id, u.email
            "#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired refresh token".to_string()))?;

        let tokens = self.tokens.issue(user_id, &email)?;
        self.store_refresh_token(user_id, &tokens.refresh_token).await?;

        Ok(tokens)
    }

    /// Fetch the account of an authenticated user
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password_hash, display_name, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        Ok(user.into())
    }

    /// Store refresh token in database
    async fn store_refresh_token(&self, user_id: Uuid, token: &str) -> AppResult<()> {
        let token_hash = self.tokens.hash_refresh_token(token)?;

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&token_hash)
        .bind(self.tokens.refresh_expires_at())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value violates unique constraint \"users_email_key\"")]
    struct UniqueEmailError;

    impl sqlx::error::DatabaseError for UniqueEmailError {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn test_duplicate_email_insert_is_conflict() {
        let err = duplicate_email(sqlx::Error::Database(Box::new(UniqueEmailError)));
        assert!(matches!(err, AppError::Conflict { ref resource, .. } if resource == "email"));

        let other = duplicate_email(sqlx::Error::RowNotFound);
        assert!(matches!(other, AppError::DatabaseError(_)));
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", 3600, 604800)
    }

    #[test]
    fn test_issue_and_decode_round_trip() {
        let user_id = Uuid::new_v4();
        let tokens = issuer().issue(user_id, "grower@example.com").unwrap();
        let claims = decode_claims(&tokens.access_token, "test-secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "grower@example.com");
        assert_eq!(tokens.token_type, "Bearer");
    }

    #[test]
    fn test_decode_rejects_other_secret() {
        let tokens = issuer().issue(Uuid::new_v4(), "a@b.io").unwrap();
        assert!(matches!(
            decode_claims(&tokens.access_token, "another-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        let expired = TokenIssuer::new("test-secret", -3600, 604800);
        let tokens = expired.issue(Uuid::new_v4(), "a@b.io").unwrap();
        assert!(decode_claims(&tokens.access_token, "test-secret").is_err());
    }

    #[test]
    fn test_refresh_token_hash_is_keyed_and_stable() {
        let a = issuer().hash_refresh_token("token").unwrap();
        let b = issuer().hash_refresh_token("token").unwrap();
        let c = TokenIssuer::new("other", 1, 1).hash_refresh_token("token").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, "token");
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Grower@Example.COM "), "grower@example.com");
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            email: "grower@example.com".to_string(),
            password: "short".to_string(),
            display_name: "Asha".to_string(),
        };
        let error = AppError::from(input.validate().unwrap_err());
        match error {
            AppError::Validation { field, .. } => assert_eq!(field, "password"),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }
}
