//! Web server implementation for OAuth verification

use anyhow::Context;
use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    routing::get,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::admin::{admin_router, AdminState};
use super::auth::SharedSessionStore;
use super::pages::{home_page, success_page};
use crate::config::Config;
use crate::error::GateError;
use crate::logging::SharedLogBuffer;
use crate::state::SharedVerifiedStore;
use crate::verification::Verifier;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedVerifiedStore,
    pub verifier: Arc<Verifier>,
    pub session_store: SharedSessionStore,
    pub log_buffer: SharedLogBuffer,
}

/// Query parameters from Discord OAuth callback
#[derive(Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    /// Set instead of `code` when the user declined authorization
    error: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let admin_state = AdminState {
        config: state.config.clone(),
        store: state.store.clone(),
        session_store: state.session_store.clone(),
        log_buffer: state.log_buffer.clone(),
    };

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/login", get(login))
        .route("/callback", get(oauth_callback))
        .route("/success", get(success))
        .with_state(state)
        .nest("/admin", admin_router(admin_state))
        .layer(TraceLayer::new_for_http())
}

/// Start the web server for OAuth verification and admin panel
pub async fn start_web_server(state: AppState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("=== Discord OAuth Configuration ===");
    info!("Redirect URI to register in the Discord Developer Portal:");
    info!("  {}", config.redirect_uri);
    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set: admin panel is disabled");
    }

    match &config.tls {
        Some(tls) => {
            info!("Loading TLS certificates:");
            info!("  Certificate: {}", tls.cert_path.display());
            info!("  Private key: {}", tls.key_path.display());

            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to load TLS certificates ({}, {})",
                        tls.cert_path.display(),
                        tls.key_path.display()
                    )
                })?;

            let handle = axum_server::Handle::new();
            let shutdown_handle = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_handle.graceful_shutdown(None);
            });

            info!("Web server listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind web server on {}", addr))?;
            info!("Web server listening on http://{}", listener.local_addr()?);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// GET / - Landing page with the verified member count
async fn home(State(state): State<AppState>) -> Html<String> {
    Html(home_page(state.store.count().await))
}

/// Health check endpoint
async fn health() -> &'static str {
    "OAuth Verification Server Running"
}

/// GET /login - Send the browser to Discord's authorize page
async fn login(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.config.authorize_url())
}

/// GET /callback - OAuth callback handler
async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, GateError> {
    if let Some(error) = &params.error {
        warn!("Discord returned OAuth error: {}", error);
    }

    let outcome = state.verifier.verify(params.code.as_deref()).await?;

    info!(
        "User {} verified as '{}' via OAuth (new: {}, join: {}, add role: {}, remove role: {}, notified: {})",
        outcome.user.id,
        outcome.user.display_name,
        outcome.newly_recorded,
        outcome.provisioning.joined,
        outcome.provisioning.role_added,
        outcome.provisioning.role_removed,
        outcome.notified
    );

    Ok(Redirect::to("/success"))
}

/// GET /success - Shown after a completed callback
async fn success() -> Html<String> {
    Html(success_page())
}
