//! Outbound port: handing an encoded call to the station transport

use async_trait::async_trait;
use serde_json::Value;

use crate::application::context::CallContext;
use crate::application::errors::TransportError;
use crate::domain::ActionId;

/// A CSMS-initiated call, already encoded and assigned a message id.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCall {
    pub message_id: String,
    pub action: ActionId,
    pub payload: Value,
}

/// Transport that delivers calls to a connected charge station.
///
/// `send` returns once the frame is queued on the station's connection.
/// The answer comes back asynchronously through the result correlator.
#[async_trait]
pub trait CallMaker: Send + Sync {
    async fn send(
        &self,
        ctx: &CallContext,
        charge_station_id: &str,
        call: OutboundCall,
    ) -> Result<(), TransportError>;
}
