//! ExpressLink demo badge
//!
//! Drives an AWS IoT ExpressLink module over its AT command UART and keeps
//! the badge in sync with its device shadow:
//! - [`expresslink`]: command engine, typed commands, configuration
//!   dictionary and the event-pending signal
//! - [`events`]: `EVENT?` drain loop and dispatch
//! - [`shadow`]: property bindings and the desired/reported synchronizer
//! - [`controller`]: startup sequence and control loop

pub mod config;
pub mod controller;
pub mod events;
pub mod expresslink;
pub mod peripherals;
pub mod shadow;
pub mod transport;
