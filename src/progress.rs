//! Phase-observer trait for the conversion flow.
//!
//! Every action walks the same linear state machine:
//!
//! ```text
//! Idle ─▶ Validating ─▶ Invoking ─▶ Normalizing ─▶ Displaying
//!              │             │            │
//!              └─────────────┴────────────┴──────▶ Error
//! ```
//!
//! Inject an [`Arc<dyn PhaseObserver>`] into a [`crate::session::Session`]
//! to drive a spinner, a status line, or a log. The trait is `Send + Sync`
//! because the extraction runs on a spawned task.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2md_studio::{Phase, PhaseObserver};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Recorder(Mutex<Vec<Phase>>);
//!
//! impl PhaseObserver for Recorder {
//!     fn on_phase(&self, phase: Phase) {
//!         self.0.lock().unwrap().push(phase);
//!     }
//! }
//!
//! let rec = Recorder::default();
//! rec.on_phase(Phase::Validating);
//! assert_eq!(rec.0.lock().unwrap().as_slice(), &[Phase::Validating]);
//! ```

use crate::error::StudioError;
use std::fmt;
use std::sync::Arc;

/// One state of the conversion flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    /// Credentials, page selection and upload are being checked. No I/O yet.
    Validating,
    /// The engine is running.
    Invoking,
    /// Engine output is being cleaned and joined.
    Normalizing,
    /// Results are ready for the shell.
    Displaying,
    /// The action failed; see [`PhaseObserver::on_error`].
    Error,
}

impl Phase {
    /// True for `Displaying` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Displaying | Phase::Error)
    }

    /// Whether the flow may move from `self` to `next`.
    pub fn can_advance_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Invoking)
                | (Invoking, Normalizing)
                | (Normalizing, Displaying)
                | (Validating | Invoking | Normalizing, Error)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "Idle",
            Phase::Validating => "Validating configuration",
            Phase::Invoking => "Processing PDF",
            Phase::Normalizing => "Formatting output",
            Phase::Displaying => "Done",
            Phase::Error => "Failed",
        };
        f.write_str(label)
    }
}

/// Receives flow transitions. All methods default to no-ops.
pub trait PhaseObserver: Send + Sync {
    /// Called on entry to each phase, in order.
    fn on_phase(&self, phase: Phase) {
        let _ = phase;
    }

    /// Called once, right after `on_phase(Phase::Error)`.
    fn on_error(&self, error: &StudioError) {
        let _ = error;
    }

    /// A problem the flow recovered from, e.g. an unreadable page selection
    /// that fell back to all pages. The action continues.
    fn on_warning(&self, warning: &StudioError) {
        let _ = warning;
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl PhaseObserver for NoopObserver {}

/// Convenience alias matching the type stored in a session.
pub type SharedObserver = Arc<dyn PhaseObserver>;
