use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    routing::{get, post},
};

use crate::{
    dto::auth::{CurrentUser, LoginRequest, LoginResponse, SignupRequest},
    error::AppResult,
    middleware::auth::{AuthUser, clear_session_cookie, session_cookie},
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<User>),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 403, description = "Role cannot be self-assigned")
    ),
    tag = "Auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = auth_service::signup(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started; sets the session cookie", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<([(header::HeaderName, String); 1], Json<ApiResponse<LoginResponse>>)> {
    let resp = auth_service::login(&state, payload).await?;
    let token = resp
        .data
        .as_ref()
        .map(|data| data.token.as_str())
        .unwrap_or_default();
    let cookie = session_cookie(
        token,
        state.config.session_ttl_hours * 3600,
        state.config.cookie_secure,
    );
    Ok(([(header::SET_COOKIE, cookie)], Json(resp)))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session ended; clears the session cookie", body = ApiResponse<serde_json::Value>),
        (status = 401, description = "Not logged in")
    ),
    security(("session_cookie" = []), ("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<([(header::HeaderName, String); 1], Json<ApiResponse<serde_json::Value>>)> {
    let resp = auth_service::logout(&state, &user).await?;
    let cookie = clear_session_cookie(state.config.cookie_secure);
    Ok(([(header::SET_COOKIE, cookie)], Json(resp)))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user, or null when not logged in", body = ApiResponse<CurrentUser>)
    ),
    tag = "Auth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: Option<AuthUser>,
) -> AppResult<Json<ApiResponse<CurrentUser>>> {
    let resp = auth_service::current_user(&state, user.as_ref()).await?;
    Ok(Json(resp))
}
