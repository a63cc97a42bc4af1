use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        account::NewAccount,
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        store::AccountStore,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    // Missing required fields and unknown enum values both land here.
    let Json(mut payload) = payload.map_err(|e| {
        warn!(error = %e, "register body rejected");
        AuthError::invalid_field("Invalid request body")
    })?;

    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() || payload.email.is_empty() || payload.password.is_empty() {
        warn!("register missing required fields");
        return Err(AuthError::invalid_field("Missing required fields"));
    }

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AuthError::invalid_field("Invalid email"));
    }

    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::invalid_field("Password too short"));
    }

    // Pre-flight uniqueness check on both keys. The store's own unique
    // constraints still arbitrate a concurrent insert below.
    if state
        .accounts
        .find_by_email_or_username(&payload.email, &payload.username)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, username = %payload.username, "user already exists");
        return Err(AuthError::AlreadyExists);
    }

    let password_hash = hash_password(&payload.password)?;

    let account = state
        .accounts
        .insert(NewAccount {
            username: payload.username,
            email: payload.email,
            password_hash,
            profile: payload.profile,
        })
        .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(account.id, &account.username)?;

    info!(user_id = %account.id, email = %account.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: PublicUser::from(account),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password must be indistinguishable to the
    // caller, so both collapse into the same rejection.
    let account = match state.accounts.find_by_email(&payload.email).await? {
        Some(a) => a,
        None => {
            warn!(email = %payload.email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !verify_password(&payload.password, &account.password_hash)? {
        warn!(user_id = %account.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(account.id, &account.username)?;

    info!(user_id = %account.id, email = %account.email, "user logged in");
    Ok(Json(AuthResponse {
        user: PublicUser::from(account),
        token,
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AuthError> {
    let account = state.accounts.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token subject no longer exists");
        AuthError::Unauthenticated
    })?;
    Ok(Json(PublicUser::from(account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::account::Profile;

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            profile: Profile::default(),
        }
    }

    async fn do_register(
        state: &AppState,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
        register(
            State(state.clone()),
            Ok(Json(register_request(username, email, password))),
        )
        .await
    }

    async fn do_login(
        state: &AppState,
        email: &str,
        password: &str,
    ) -> Result<Json<AuthResponse>, AuthError> {
        login(
            State(state.clone()),
            Json(LoginRequest {
                email: email.into(),
                password: password.into(),
            }),
        )
        .await
    }

    #[tokio::test]
    async fn register_returns_created_with_projection_and_token() {
        let state = AppState::fake();
        let (status, Json(response)) = do_register(&state, "alice", "a@x.com", "pw123456")
            .await
            .expect("register succeeds");

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.user.username, "alice");
        assert_eq!(response.user.email, "a@x.com");
        assert!(!response.token.is_empty());

        // The issued token asserts the new account.
        let keys = JwtKeys::from_ref(&state);
        let claims = keys.verify(&response.token).expect("token verifies");
        assert_eq!(claims.sub, response.user.id);
        assert_eq!(claims.username, "alice");

        // The projection never carries the digest.
        let json = serde_json::to_value(&response.user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("secretDigest").is_none());
    }

    #[tokio::test]
    async fn register_rejects_missing_fields() {
        let state = AppState::fake();
        let err = do_register(&state, "", "a@x.com", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = do_register(&state, "alice", "a@x.com", "").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_malformed_email_and_short_password() {
        let state = AppState::fake();
        let err = do_register(&state, "alice", "not-an-email", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = do_register(&state, "alice", "a@x.com", "short").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_normalizes_email_case() {
        let state = AppState::fake();
        do_register(&state, "alice", "  Alice@X.Com ", "pw123456")
            .await
            .expect("register succeeds");
        let Json(response) = do_login(&state, "alice@x.com", "pw123456")
            .await
            .expect("login with lowercase email");
        assert_eq!(response.user.email, "alice@x.com");
    }

    #[tokio::test]
    async fn duplicate_identifier_or_handle_is_rejected() {
        let state = AppState::fake();
        do_register(&state, "alice", "a@x.com", "pw123456")
            .await
            .expect("first register");

        // Same email, different handle.
        let err = do_register(&state, "alice2", "a@x.com", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "User already exists");

        // Same handle, different email.
        let err = do_register(&state, "alice", "b@x.com", "pw123456")
            .await
            .unwrap_err();
        assert_eq!(err.message(), "User already exists");
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::fake();
        do_register(&state, "alice", "a@x.com", "pw123456")
            .await
            .expect("register");

        let unknown = do_login(&state, "ghost@x.com", "pw123456").await.unwrap_err();
        let wrong_password = do_login(&state, "a@x.com", "wrong-password")
            .await
            .unwrap_err();

        assert_eq!(unknown.status(), wrong_password.status());
        assert_eq!(unknown.message(), wrong_password.message());
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_login_roundtrip() {
        let state = AppState::fake();
        let (_, Json(registered)) = do_register(&state, "alice", "a@x.com", "pw123456")
            .await
            .expect("register");

        let Json(logged_in) = do_login(&state, "a@x.com", "pw123456")
            .await
            .expect("login succeeds");
        assert_eq!(logged_in.user.id, registered.user.id);
        assert_eq!(logged_in.user.username, "alice");
        assert_eq!(logged_in.user.email, "a@x.com");
        assert!(!logged_in.token.is_empty());
    }

    #[tokio::test]
    async fn me_returns_projection_for_token_subject() {
        let state = AppState::fake();
        let (_, Json(registered)) = do_register(&state, "alice", "a@x.com", "pw123456")
            .await
            .expect("register");

        let Json(profile) = me(State(state.clone()), AuthUser(registered.user.id))
            .await
            .expect("me succeeds");
        assert_eq!(profile.id, registered.user.id);
        assert_eq!(profile.username, "alice");

        let err = me(State(state.clone()), AuthUser(uuid::Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    // The end-to-end scenario: register alice, re-register her identifier,
    // fail a login, then succeed.
    #[tokio::test]
    async fn full_auth_scenario() {
        let state = AppState::fake();

        let (status, Json(response)) = do_register(&state, "alice", "a@x.com", "pw1234567")
            .await
            .expect("register alice");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.user.username, "alice");
        assert!(!response.token.is_empty());

        let err = do_register(&state, "someone-else", "a@x.com", "pw1234567")
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "User already exists");

        let err = do_login(&state, "a@x.com", "wrong").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), "Invalid credentials");

        let Json(response) = do_login(&state, "a@x.com", "pw1234567")
            .await
            .expect("login succeeds");
        let keys = JwtKeys::from_ref(&state);
        assert!(keys.verify(&response.token).is_ok());
    }
}
