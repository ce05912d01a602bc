//! Long-running server jobs: start, observe, cancel.

pub mod enrollment;
pub mod poller;
pub mod status;

pub use enrollment::EnrollmentJob;
pub use poller::{JobBackend, PollOutcome, PollState, PollerConfig, TaskPoller};
pub use status::{TaskHandle, TaskStatus};
