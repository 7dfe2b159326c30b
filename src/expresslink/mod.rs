//! ExpressLink module driver
//!
//! The command engine owns the UART; typed commands, the configuration
//! dictionary and the event signal build on it.

pub mod commands;
pub mod dictionary;
pub mod engine;
pub mod signal;

pub use commands::{ConnectionStatus, ModuleTime, OtaState, OtaStatus};
pub use dictionary::{Access, ConfigKey};
pub use engine::{CommandEngine, CommandError};
pub use signal::{DebouncedSignal, EventSignal, LevelInput, SysfsGpio};
