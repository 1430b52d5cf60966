//! Web front door: landing page, OAuth login and callback, admin panel

mod admin;
mod auth;
mod pages;
mod server;

pub use auth::create_session_store;
pub use server::{start_web_server, AppState};
