pub mod line;
pub mod serial;
pub mod tcp;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use line::{LineError, LineTransport};
pub use serial::{SerialConnector, SerialTransportStream};
pub use tcp::{TcpConnector, TcpTransportStream};
pub use traits::{TransportConnector, TransportStream};
