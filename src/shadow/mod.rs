//! Device shadow synchronization

pub mod bindings;
pub mod synchronizer;

pub use bindings::{Binding, ConfigFlag, Source};
pub use synchronizer::{PublishFailure, ShadowSynchronizer};
