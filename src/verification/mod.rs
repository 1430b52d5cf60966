mod types;
mod workflow;

pub use workflow::Verifier;
