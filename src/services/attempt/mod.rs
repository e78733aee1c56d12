//! Taking an assessment: the attempt state machine, its answer buffers and
//! countdown, and the async controller that talks to the backend.

mod answers;
mod controller;
mod countdown;
mod errors;
mod retry;
mod session;

pub use answers::AnswerBuffer;
pub use controller::{AttemptController, AttemptOptions, FinalizeOutcome, TickResult};
pub use countdown::{Countdown, Tick};
pub use errors::AttemptError;
pub use retry::RetryPolicy;
pub use session::{
    Attempt, AttemptPhase, AttemptReport, AttemptSession, AttemptView, DisclaimerSummary,
    FinalSubmission, FinalizeJob, FinalizeMode, FinalizeResolution, PendingAnswer, Progress,
    SyncStatus, TickOutcome,
};
