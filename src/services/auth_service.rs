use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{Claims, CurrentUser, LoginRequest, LoginResponse, SignupRequest},
    entity::{
        sea_orm_active_enums::Role,
        sessions::{ActiveModel as SessionActive, Column as SessionCol, Entity as Sessions},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
// Column widths of `users.name` and `users.email`.
const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 120;

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Sign a session token for `user_id` bound to session `sid`.
pub fn issue_token(
    config: &AppConfig,
    user_id: Uuid,
    role: Role,
    sid: Uuid,
    expires_at: chrono::DateTime<Utc>,
) -> AppResult<String> {
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.as_str().to_string(),
        sid: sid.to_string(),
        exp: expires_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn decode_token(config: &AppConfig, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthenticated)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

fn validate_signup(name: &str, email: &str, password: &str) -> AppResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(AppError::validation(format!(
            "email must be at most {MAX_EMAIL_LEN} characters"
        )));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid_email {
        return Err(AppError::validation("a valid email is required"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Roles a visitor may pick for themselves at signup.
fn self_service_role(role: Option<&str>) -> AppResult<Role> {
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Customer),
        Some(value) => match Role::parse(value) {
            Some(role @ (Role::Customer | Role::Supplier)) => Ok(role),
            Some(_) => Err(AppError::Forbidden),
            None => Err(AppError::validation(format!("unknown role `{value}`"))),
        },
    }
}

async fn insert_user(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
    role: Role,
) -> AppResult<User> {
    let email = normalize_email(email);
    validate_signup(name, &email, password)?;

    let exist = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exist.is_some() {
        return Err(AppError::DuplicateEmail);
    }

    let password_hash = hash_password(password)?;
    let inserted = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.trim().to_string()),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(role),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await;

    // A concurrent signup can pass the lookup above; the unique index decides.
    let user = match inserted {
        Ok(user) => user,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::DuplicateEmail);
        }
        Err(err) => return Err(err.into()),
    };

    Ok(User::from(user))
}

pub async fn signup(state: &AppState, payload: SignupRequest) -> AppResult<ApiResponse<User>> {
    let SignupRequest {
        name,
        email,
        password,
        role,
    } = payload;
    let role = self_service_role(role.as_deref())?;
    let user = insert_user(state, &name, &email, &password, role).await?;

    audit::record(
        state,
        user.id,
        "user_signup",
        "users",
        serde_json::json!({ "user_id": user.id, "role": user.role }),
    )
    .await;

    Ok(ApiResponse::success(
        "Signup successful",
        user,
        Some(Meta::empty()),
    ))
}

/// Administrative account creation; any role is allowed.
pub async fn create_user(
    state: &AppState,
    admin: &AuthUser,
    payload: SignupRequest,
) -> AppResult<ApiResponse<User>> {
    crate::middleware::auth::ensure_admin(admin)?;
    let role = match payload.role.as_deref() {
        None => Role::Customer,
        Some(value) => Role::parse(value.trim())
            .ok_or_else(|| AppError::validation(format!("unknown role `{value}`")))?,
    };
    let user = insert_user(state, &payload.name, &payload.email, &payload.password, role).await?;

    audit::record(
        state,
        admin.user_id,
        "user_create",
        "users",
        serde_json::json!({ "user_id": user.id, "role": user.role }),
    )
    .await;

    Ok(ApiResponse::success("User created", user, Some(Meta::empty())))
}

pub async fn login(state: &AppState, payload: LoginRequest) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(normalize_email(&email)))
        .one(&state.orm)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    let now = Utc::now();
    // Sweep this user's dead sessions so the table does not only grow.
    Sessions::delete_many()
        .filter(SessionCol::UserId.eq(user.id))
        .filter(SessionCol::ExpiresAt.lte(now))
        .exec(&state.orm)
        .await?;

    let expires_at = now
        .checked_add_signed(Duration::hours(state.config.session_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let session = SessionActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.id),
        created_at: NotSet,
        expires_at: Set(expires_at.into()),
    }
    .insert(&state.orm)
    .await?;

    let token = issue_token(&state.config, user.id, user.role, session.id, expires_at)?;

    audit::record(
        state,
        user.id,
        "user_login",
        "sessions",
        serde_json::json!({ "session_id": session.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            user_id: user.id,
            token,
        },
        Some(Meta::empty()),
    ))
}

pub async fn logout(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<serde_json::Value>> {
    Sessions::delete_by_id(user.session_id)
        .exec(&state.orm)
        .await?;

    audit::record(
        state,
        user.user_id,
        "user_logout",
        "sessions",
        serde_json::json!({ "session_id": user.session_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged out successfully",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Turn a token into the caller's identity. The session row must still exist
/// and be unexpired; the role comes from the user row, not the token.
pub async fn resolve_session(state: &AppState, token: &str) -> AppResult<AuthUser> {
    let claims = decode_token(&state.config, token)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthenticated)?;
    let session_id = Uuid::parse_str(&claims.sid).map_err(|_| AppError::Unauthenticated)?;

    let (session, user) = Sessions::find_by_id(session_id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    let user = user.ok_or(AppError::Unauthenticated)?;

    if session.user_id != user_id || session.expires_at.with_timezone(&Utc) <= Utc::now() {
        return Err(AppError::Unauthenticated);
    }

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
        session_id: session.id,
    })
}

pub async fn current_user(
    state: &AppState,
    user: Option<&AuthUser>,
) -> AppResult<ApiResponse<CurrentUser>> {
    let user = match user {
        Some(auth) => Users::find_by_id(auth.user_id)
            .one(&state.orm)
            .await?
            .map(User::from),
        None => None,
    };
    Ok(ApiResponse::success(
        "Current user",
        CurrentUser { user },
        Some(Meta::empty()),
    ))
}
