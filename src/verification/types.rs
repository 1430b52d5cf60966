// src/verification/types.rs
use std::fmt;

use crate::discord::JoinOutcome;
use crate::state::VerifiedUser;

/// Stages of a single OAuth callback, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingCode,
    ExchangingToken,
    FetchingProfile,
    Provisioning,
    Persisting,
    Notifying,
    Completed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::AwaitingCode => "awaiting-code",
            Stage::ExchangingToken => "exchanging-token",
            Stage::FetchingProfile => "fetching-profile",
            Stage::Provisioning => "provisioning",
            Stage::Persisting => "persisting",
            Stage::Notifying => "notifying",
            Stage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Outcome of one provisioning call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Nothing to do (e.g. already a guild member)
    AlreadyDone,
    Failed(String),
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, StepOutcome::Failed(_))
    }
}

impl From<JoinOutcome> for StepOutcome {
    fn from(outcome: JoinOutcome) -> Self {
        match outcome {
            JoinOutcome::Added => StepOutcome::Done,
            JoinOutcome::AlreadyMember => StepOutcome::AlreadyDone,
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("done"),
            StepOutcome::AlreadyDone => f.write_str("already done"),
            StepOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Per-step result of joining the guild and swapping roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub joined: StepOutcome,
    pub role_added: StepOutcome,
    pub role_removed: StepOutcome,
}

impl ProvisioningReport {
    pub fn is_complete(&self) -> bool {
        self.joined.succeeded() && self.role_added.succeeded() && self.role_removed.succeeded()
    }
}

/// Everything a completed callback produced
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    /// The stored record (the pre-existing one on re-verification)
    pub user: VerifiedUser,
    pub newly_recorded: bool,
    pub provisioning: ProvisioningReport,
    pub notified: bool,
}
