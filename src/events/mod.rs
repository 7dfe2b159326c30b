//! Out-of-band event handling

pub mod dispatch;
pub mod drain;

pub use dispatch::dispatch;
pub use drain::{EventDrainer, PollOutcome};
