//! Session resolution middleware and session cookie helpers

use axum::{
    extract::{Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{Authorization, authorization::Bearer},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{error::ApiError, models::ValidatedSession, state::AppState};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Session of the current request, resolved once by [`session_middleware`]
#[derive(Debug, Clone, Default)]
pub struct RequestSession(pub Option<ValidatedSession>);

impl RequestSession {
    /// The session, or 401 when the request is anonymous
    pub fn require(&self) -> Result<&ValidatedSession, ApiError> {
        self.0.as_ref().ok_or(ApiError::Unauthorized)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|validated| validated.user.id)
    }
}

/// Resolve the session token from the `session` cookie or a bearer header
/// and attach a [`RequestSession`] to the request.
///
/// The cookie is tried first; when it does not validate, the bearer token is
/// tried. A renewed cookie session gets its cookie re-issued unless the
/// handler already set one.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut reissue = None;
    let mut validated = None;

    if let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) {
        validated = state.sessions.validate_session_token(&token).await;
        if let Some(session) = validated.as_ref().filter(|v| v.renewed) {
            reissue = Some(session_cookie(
                token,
                session.session.expires_at,
                state.config.production,
            ));
        }
    }

    if validated.is_none() {
        if let Some(TypedHeader(auth)) = bearer {
            validated = state.sessions.validate_session_token(auth.token()).await;
        }
    }

    req.extensions_mut().insert(RequestSession(validated));
    let response = next.run(req).await;

    match reissue {
        Some(cookie) if !response.headers().contains_key(SET_COOKIE) => {
            (jar.add(cookie), response).into_response()
        }
        _ => response,
    }
}

/// Session cookie living until `expires_at`
pub fn session_cookie(token: String, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    Cookie::build((SESSION_COOKIE, token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age))
        .build()
}

/// Cookie that removes the session cookie from the browser
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::ZERO)
        .build()
}
