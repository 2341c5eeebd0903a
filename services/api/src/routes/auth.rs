//! Login, logout and session lookup handlers

use axum::{
    Extension, Json,
    extract::{Query, State, rejection::JsonRejection, rejection::QueryRejection},
    http::{StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    error::ApiError,
    middleware::{RequestSession, clear_session_cookie, session_cookie},
    models::{SessionResponse, ValidateTokenRequest, ValidatedSession},
    oauth::{STATE_COOKIE, VERIFIER_COOKIE},
    session::generate_session_token,
    state::AppState,
};

/// Lifetime of the OAuth state and verifier cookies, in seconds
const OAUTH_COOKIE_MAX_AGE: i64 = 10 * 60;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

fn found(location: &str) -> (StatusCode, [(axum::http::HeaderName, String); 1]) {
    (StatusCode::FOUND, [(LOCATION, location.to_string())])
}

fn oauth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(OAUTH_COOKIE_MAX_AGE))
        .build()
}

fn session_body(validated: Option<ValidatedSession>) -> Response {
    match validated {
        Some(validated) => Json(SessionResponse::from(validated)).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(SessionResponse::unauthorized()),
        )
            .into_response(),
    }
}

/// Redirect the browser to Google with PKCE and CSRF state cookies
pub async fn google_login(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;

    let request = google.authorization_request();
    let secure = state.config.production;
    let jar = jar
        .add(oauth_cookie(STATE_COOKIE, request.state, secure))
        .add(oauth_cookie(VERIFIER_COOKIE, request.pkce_verifier, secure));

    Ok((jar, found(&request.url)))
}

/// Complete the Google login: verify state, create the user on first login,
/// open a session and set its cookie
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    query: Result<Query<CallbackQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let google = state
        .google
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("Not found".to_string()))?;
    let Query(query) = query?;

    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let verifier = jar.get(VERIFIER_COOKIE).map(|c| c.value().to_string());

    let (code, verifier) = match (query.code, query.state, expected_state, verifier) {
        (Some(code), Some(received), Some(expected), Some(verifier)) if received == expected => {
            (code, verifier)
        }
        _ => {
            warn!("Rejected Google callback with missing or mismatched state");
            return Err(ApiError::BadRequest("Invalid OAuth state".to_string()));
        }
    };

    let access_token = google.exchange_code(code, verifier).await.map_err(|e| {
        error!("Failed to exchange Google authorization code: {}", e);
        ApiError::Internal("Failed to sign in with Google")
    })?;

    let profile = google.fetch_profile(&access_token).await.map_err(|e| {
        error!("Failed to fetch Google profile: {}", e);
        ApiError::Internal("Failed to sign in with Google")
    })?;

    let existing = state
        .users
        .find_by_external_id(&profile.id)
        .await
        .map_err(|e| {
            error!("Failed to look up user: {}", e);
            ApiError::Internal("Failed to sign in with Google")
        })?;

    let user = match existing {
        Some(user) => user,
        None => state.users.create(&profile.into()).await.map_err(|e| {
            error!("Failed to create user: {}", e);
            ApiError::Internal("Failed to sign in with Google")
        })?,
    };

    let token = generate_session_token();
    let session = state
        .sessions
        .create_session(&token, user.id)
        .await
        .map_err(|e| {
            error!("Failed to create session: {}", e);
            ApiError::Internal("Failed to sign in with Google")
        })?;

    info!("User {} signed in with Google", user.id);

    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path("/"))
        .remove(Cookie::build(VERIFIER_COOKIE).path("/"))
        .add(session_cookie(
            token,
            session.expires_at,
            state.config.production,
        ));

    Ok((jar, found("/")))
}

/// Invalidate the current session and clear its cookie
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let validated = current.require()?;

    state
        .sessions
        .invalidate_session(&validated.session.id)
        .await
        .map_err(|e| {
            error!("Failed to invalidate session: {}", e);
            ApiError::Internal("Failed to log out")
        })?;

    info!("User {} logged out", validated.user.id);

    let jar = jar.add(clear_session_cookie(state.config.production));
    Ok((jar, found("/")))
}

/// Invalidate every session of the current user and clear the cookie
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current): Extension<RequestSession>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let validated = current.require()?;

    let removed = state
        .sessions
        .invalidate_user_sessions(validated.user.id)
        .await
        .map_err(|e| {
            error!("Failed to invalidate user sessions: {}", e);
            ApiError::Internal("Failed to log out")
        })?;

    info!("User {} logged out of {} sessions", validated.user.id, removed);

    let jar = jar.add(clear_session_cookie(state.config.production));
    Ok((jar, found("/")))
}

/// Session of the request (cookie or bearer token)
pub async fn current_session(Extension(current): Extension<RequestSession>) -> Response {
    session_body(current.0)
}

/// Validate a token supplied in the request body
pub async fn validate_token(
    State(state): State<AppState>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let validated = state.sessions.validate_session_token(&payload.token).await;
    Ok(session_body(validated))
}
