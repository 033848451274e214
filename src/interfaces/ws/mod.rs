//! WebSocket interface
//!
//! - `ocpp_server`: OCPP-J WebSocket server (1.6 and 2.0.1)
//! - `negotiator`: subprotocol negotiation
//! - `router`: per-session inbound frame routing

pub mod negotiator;
pub mod ocpp_server;
pub mod router;

pub use negotiator::{Negotiated, ProtocolNegotiator};
pub use ocpp_server::OcppServer;
pub use router::FrameRouter;
