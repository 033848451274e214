//! Interface layer: the OCPP WebSocket endpoint

pub mod ws;
