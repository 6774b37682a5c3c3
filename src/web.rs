//! HTTP surface of the dashboard: login/registration pages, the dashboard page,
//! and the two JSON endpoints the dashboard script polls.
use crate::errors::DashError;
use crate::jobs::{loader, views};
use crate::secrets::SecretCipher;
use crate::session::{CurrentUser, SessionCookie};
use crate::settings::Settings;
use crate::storage;
use axum::body::Body;
use axum::extract::{Form, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::ServeDir;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: DatabaseConnection,
    pub cipher: SecretCipher,
}

// Security headers middleware
async fn security_headers(request: Request<Body>, next: Next) -> impl IntoResponse {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("DENY"),
    );
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    // Charts are drawn by the Google Charts loader
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'self'; script-src 'self' https://www.gstatic.com; style-src 'self' 'unsafe-inline' https://www.gstatic.com; img-src 'self' data:; form-action 'self'"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    response
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/chart-data", get(chart_data))
        .route("/job-summary", get(job_summary))
        .route("/register", get(register_page).post(register_submit))
        .route("/login", get(login_page).post(login_submit))
        .route("/logout", get(logout))
        .nest_service("/static", ServeDir::new("static"))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

pub async fn serve(
    settings: Settings,
    db: DatabaseConnection,
    cipher: SecretCipher,
) -> miette::Result<()> {
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    if settings.server.allow_public_registration {
        tracing::info!("Public user registration is ENABLED");
    } else {
        tracing::info!("Public user registration is DISABLED");
    }

    let state = AppState {
        settings: Arc::new(settings),
        db,
        cipher,
    };
    let app = router(state);

    tracing::info!(%addr, "Dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, app).await.into_diagnostic()?;
    Ok(())
}

async fn dashboard(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    Html(dashboard_html(&user.username))
}

async fn chart_data(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    tracing::debug!(user = %user.username, "Computing chart data");
    let dataset = loader::load_jobs(&state.db).await;
    match views::compute_chart_view(&dataset) {
        Ok(chart) => Json(chart).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Chart data unavailable");
            Json(e).into_response()
        }
    }
}

async fn job_summary(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Response {
    tracing::debug!(user = %user.username, "Computing job summary");
    let dataset = loader::load_jobs(&state.db).await;
    match views::compute_summary_view(&dataset) {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Job summary unavailable");
            Json(e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegisterForm {
    username: String,
    password: String,
    #[serde(default)]
    secret_data: String,
}

async fn register_page() -> impl IntoResponse {
    Html(register_html())
}

async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Response {
    if !state.settings.server.allow_public_registration {
        return (StatusCode::FORBIDDEN, "Registration is disabled").into_response();
    }

    match storage::register_user(
        &state.db,
        &state.cipher,
        &form.username,
        &form.password,
        &form.secret_data,
    )
    .await
    {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "Registered user");
            Redirect::to("/login").into_response()
        }
        Err(DashError::UsernameTaken) => {
            tracing::info!(username = %form.username, "Registration rejected: username taken");
            DashError::UsernameTaken.into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_page() -> impl IntoResponse {
    Html(login_html(None))
}

async fn login_submit(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let identity =
        match storage::verify_user_password(&state.db, &form.username, &form.password).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                tracing::info!(username = %form.username, "Login failed");
                return Html(login_html(Some("Invalid credentials!"))).into_response();
            }
            Err(e) => return e.into_response(),
        };

    let session = match storage::create_session(
        &state.db,
        identity.id,
        state.settings.server.session_ttl_secs,
    )
    .await
    {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };
    tracing::info!(user_id = identity.id, username = %identity.username, "Logged in");

    let cookie = SessionCookie::new(session.session_id);
    see_other("/", cookie.to_cookie_header(&state.settings))
}

async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Response {
    if let Some(cookie) = SessionCookie::from_headers(&headers) {
        if let Err(e) = storage::delete_session(&state.db, &cookie.session_id).await {
            tracing::warn!(error = %e, "Failed to delete session");
        }
    }
    tracing::info!(user_id = user.id, "Logged out");

    see_other("/login", SessionCookie::delete_cookie_header())
}

fn see_other(location: &str, set_cookie: String) -> Response {
    let mut response = Redirect::to(location).into_response();
    match HeaderValue::from_str(&set_cookie) {
        Ok(value) => {
            response
                .headers_mut()
                .insert(axum::http::header::SET_COOKIE, value);
            response
        }
        Err(e) => DashError::Other(format!("invalid cookie header: {e}")).into_response(),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

const PAGE_STYLE: &str = r#"
    body { font-family: Arial, sans-serif; max-width: 400px; margin: 100px auto; padding: 20px; }
    h1 { color: #333; }
    label { display: block; margin-top: 10px; }
    input[type="text"], input[type="password"], textarea { width: 100%; padding: 8px; margin-top: 5px; box-sizing: border-box; }
    button { margin-top: 20px; padding: 10px 20px; background-color: #007bff; color: white; border: none; cursor: pointer; }
    button:hover { background-color: #0056b3; }
    .error { color: red; }
"#;

fn login_html(error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!(r#"<p class="error">{}</p>"#, html_escape(e)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Login - Job Dashboard</title>
    <style>{PAGE_STYLE}</style>
</head>
<body>
    <h1>Login</h1>
    {error_html}
    <form method="POST" action="/login">
        <label>Username:
            <input type="text" name="username" required autofocus>
        </label>
        <label>Password:
            <input type="password" name="password" required>
        </label>
        <button type="submit">Login</button>
    </form>
    <p><a href="/register">Create an account</a></p>
</body>
</html>"#
    )
}

fn register_html() -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Register - Job Dashboard</title>
    <style>{PAGE_STYLE}</style>
</head>
<body>
    <h1>Register</h1>
    <form method="POST" action="/register">
        <label>Username:
            <input type="text" name="username" required autofocus>
        </label>
        <label>Password:
            <input type="password" name="password" required>
        </label>
        <label>Secret note (stored encrypted):
            <textarea name="secret_data" rows="3"></textarea>
        </label>
        <button type="submit">Register</button>
    </form>
    <p><a href="/login">Back to login</a></p>
</body>
</html>"#
    )
}

fn dashboard_html(username: &str) -> String {
    let username = html_escape(username);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Job Dashboard</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 20px; }}
        header {{ display: flex; justify-content: space-between; align-items: center; }}
        .month {{ display: inline-block; vertical-align: top; width: 320px; margin: 10px; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
        #execution-time {{ width: 100%; height: 360px; }}
        .error {{ color: red; }}
    </style>
    <script src="https://www.gstatic.com/charts/loader.js"></script>
    <script src="/static/dashboard.js" defer></script>
</head>
<body>
    <header>
        <h1>Job Dashboard</h1>
        <span>Logged in as <strong>{username}</strong> | <a href="/logout">Logout</a></span>
    </header>
    <div id="status" class="error"></div>
    <h2>Job status per month</h2>
    <div id="pie-charts"></div>
    <h2>Average execution time</h2>
    <div id="execution-time"></div>
    <h2>Job summary</h2>
    <div id="summary-tables"></div>
</body>
</html>"#
    )
}
