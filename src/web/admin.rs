//! Admin panel routes and handlers
//!
//! Provides a token-protected web interface for:
//! - Listing every verified user
//! - Downloading the verified users table as JSON
//! - Viewing recent logs

use axum::{
    extract::State,
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE},
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::auth::{
    check_admin, create_logout_cookie, create_session_cookie, get_session_token, tokens_match,
    AdminAccess, SharedSessionStore,
};
use super::pages::{admin_login_page, admin_logs_page, admin_users_page};
use crate::config::Config;
use crate::logging::SharedLogBuffer;
use crate::state::SharedVerifiedStore;

const LOG_LINES: usize = 500;

#[derive(Clone)]
pub struct AdminState {
    pub config: Arc<Config>,
    pub store: SharedVerifiedStore,
    pub session_store: SharedSessionStore,
    pub log_buffer: SharedLogBuffer,
}

#[derive(Deserialize)]
pub struct LoginForm {
    token: String,
}

pub fn admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/export", get(export))
        .route("/logs", get(logs_page))
        .with_state(state)
}

/// Check authentication; on failure return the response to send instead
async fn require_auth(headers: &HeaderMap, state: &AdminState) -> Result<(), Response> {
    match check_admin(headers, &state.config, &state.session_store).await {
        AdminAccess::Granted => Ok(()),
        AdminAccess::Disabled => Err(admin_disabled()),
        AdminAccess::Rejected => {
            warn!("Rejected admin request with an invalid bearer token");
            Err((StatusCode::UNAUTHORIZED, "Invalid admin token").into_response())
        }
        AdminAccess::Anonymous => Err(Redirect::to("/admin/login").into_response()),
    }
}

fn admin_disabled() -> Response {
    (
        StatusCode::FORBIDDEN,
        "Admin area disabled: set ADMIN_TOKEN to enable it",
    )
        .into_response()
}

/// GET /admin - List verified users
async fn dashboard(headers: HeaderMap, State(state): State<AdminState>) -> Response {
    if let Err(response) = require_auth(&headers, &state).await {
        return response;
    }

    let users = state.store.list_all().await;
    Html(admin_users_page(&users)).into_response()
}

/// GET /admin/login - Show login form
async fn login_form(State(state): State<AdminState>) -> Response {
    if state.config.admin_token.is_none() {
        return admin_disabled();
    }
    Html(admin_login_page(None)).into_response()
}

/// POST /admin/login - Exchange the admin token for a session cookie
async fn login(State(state): State<AdminState>, Form(form): Form<LoginForm>) -> Response {
    let Some(admin_token) = state.config.admin_token.as_deref() else {
        return admin_disabled();
    };

    if !tokens_match(form.token.trim(), admin_token) {
        warn!("Failed admin login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Html(admin_login_page(Some("Invalid admin token"))),
        )
            .into_response();
    }

    state.session_store.cleanup_expired().await;
    let token = state.session_store.create_session().await;
    info!("Admin signed in");

    (
        [(
            SET_COOKIE,
            create_session_cookie(&token, state.config.tls.is_some()),
        )],
        Redirect::to("/admin"),
    )
        .into_response()
}

/// GET /admin/logout - Clear session and redirect to login
async fn logout(headers: HeaderMap, State(state): State<AdminState>) -> impl IntoResponse {
    if let Some(token) = get_session_token(&headers) {
        if let Some(session) = state.session_store.remove_session(&token).await {
            info!(
                "Admin signed out after {} minutes",
                session.age().num_minutes()
            );
        }
    }

    (
        [(SET_COOKIE, create_logout_cookie())],
        Redirect::to("/admin/login"),
    )
}

/// GET /admin/export - Download the verified users table
async fn export(headers: HeaderMap, State(state): State<AdminState>) -> Response {
    if let Err(response) = require_auth(&headers, &state).await {
        return response;
    }

    match state.store.export().await {
        Ok(bytes) => (
            [
                (CONTENT_TYPE, "application/json"),
                (
                    CONTENT_DISPOSITION,
                    "attachment; filename=\"verified_users.json\"",
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /admin/logs - Recent captured log lines
async fn logs_page(headers: HeaderMap, State(state): State<AdminState>) -> Response {
    if let Err(response) = require_auth(&headers, &state).await {
        return response;
    }

    let entries = state.log_buffer.get_recent(LOG_LINES);
    Html(admin_logs_page(&entries)).into_response()
}

