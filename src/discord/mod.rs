//! Discord REST adapter
//!
//! Everything the verifier needs from Discord sits behind [`DiscordApi`] so the
//! workflow can run against a recording fake in tests.

mod client;
#[cfg(test)]
pub mod fake;
mod message;
mod types;

pub use client::{DiscordApi, DiscordClient};
pub use message::{verification_notice, verification_panel};
pub use types::JoinOutcome;
