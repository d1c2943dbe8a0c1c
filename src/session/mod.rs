//! Streaming session control.
//!
//! The [`SessionController`] owns the viewing surface and sequences each
//! selection through its states:
//!
//! ```text
//! Idle ─select─▶ DescriptorLoading ─▶ Attaching ─▶ Streaming
//!                      │                  │
//!                      ▼                  ├─▶ Overview (fallback, degraded)
//!                    Error ◀──────────────┘
//! ```
//!
//! A new selection is accepted from any state and supersedes whatever is in
//! flight.

mod controller;
mod state;

pub use controller::SessionController;
pub use state::{OverviewReason, SelectOutcome, SessionId, SessionState};
