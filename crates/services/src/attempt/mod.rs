//! Timed quiz attempts: answer capture, countdown and single-shot submission.

mod controller;
mod gate;
mod service;
mod timer;

pub use controller::{SessionController, SubmitOutcome};
pub use gate::{GateOutcome, SubmissionGate};
pub use service::AttemptService;
pub use timer::Timer;
