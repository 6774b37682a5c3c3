use crate::settings::Settings;
use crate::storage::{self, UserIdentity};
use crate::web::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};

pub const SESSION_COOKIE_NAME: &str = "jobdash_session";

#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub session_id: String,
}

impl SessionCookie {
    pub fn new(session_id: String) -> Self {
        Self { session_id }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        // Browsers may send several Cookie headers
        for header in headers.get_all(axum::http::header::COOKIE) {
            let Ok(cookie_header) = header.to_str() else {
                continue;
            };
            for cookie in cookie_header.split(';') {
                let cookie = cookie.trim();
                if let Some(value) = cookie
                    .strip_prefix(SESSION_COOKIE_NAME)
                    .and_then(|s| s.strip_prefix('='))
                {
                    if !value.is_empty() {
                        return Some(Self {
                            session_id: value.to_string(),
                        });
                    }
                }
            }
        }
        None
    }

    pub fn to_cookie_header(&self, settings: &Settings) -> String {
        let secure = settings.base_url().starts_with("https://");

        format!(
            "{}={}; HttpOnly; {}SameSite=Lax; Path=/; Max-Age={}",
            SESSION_COOKIE_NAME,
            self.session_id,
            if secure { "Secure; " } else { "" },
            settings.server.session_ttl_secs
        )
    }

    pub fn delete_cookie_header() -> String {
        format!(
            "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
            SESSION_COOKIE_NAME
        )
    }
}

/// The logged-in user, resolved from the session cookie once per request.
///
/// Handlers that take this extractor are protected: an anonymous request, an
/// expired session or a session whose user no longer exists is answered with
/// a redirect to `/login` before the handler runs.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub UserIdentity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie = SessionCookie::from_headers(&parts.headers)
            .ok_or_else(|| Redirect::to("/login").into_response())?;

        match storage::resolve_session(&state.db, &cookie.session_id).await {
            Ok(Some(identity)) => Ok(CurrentUser(identity)),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(e) => {
                tracing::error!(error = %e, "Failed to resolve session");
                Err(e.into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; jobdash_session=abc123; other=1"),
        );

        let cookie = SessionCookie::from_headers(&headers).expect("cookie not found");
        assert_eq!(cookie.session_id, "abc123");
    }

    #[test]
    fn test_cookie_missing_or_cleared() {
        let mut headers = HeaderMap::new();
        assert!(SessionCookie::from_headers(&headers).is_none());

        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("jobdash_session=; theme=dark"),
        );
        assert!(SessionCookie::from_headers(&headers).is_none());
    }

    #[test]
    fn test_cookie_header_secure_flag() {
        let mut settings = Settings::default();
        let cookie = SessionCookie::new("xyz".to_string());

        let plain = cookie.to_cookie_header(&settings);
        assert!(plain.starts_with("jobdash_session=xyz;"));
        assert!(!plain.contains("Secure"));
        assert!(plain.contains("Max-Age=3600"));

        settings.server.public_base_url = Some("https://jobs.example.com".to_string());
        assert!(cookie.to_cookie_header(&settings).contains("Secure; "));
    }
}
