//! Deferred operation delivery
//!
//! One [`SyncEngine`] loop per [`OperationKind`] pages through the pending
//! operation store and re-dispatches due records through a
//! [`DeferredDispatcher`] that knows how to phrase the operation for the
//! station's negotiated protocol version.

mod diagnostics;
mod engine;
mod logs;

pub use diagnostics::DiagnosticsDispatcher;
pub use engine::{SyncConfig, SyncEngine, TickReport};
pub use logs::LogDispatcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::CallContext;
use super::errors::CorrelationError;
use super::registry::CallState;
use crate::domain::{OcppVersion, OperationKind, PendingOperation, StoreError};

/// Builds and sends the outbound call for one kind of pending operation.
#[async_trait]
pub trait DeferredDispatcher: Send + Sync {
    fn kind(&self) -> OperationKind;

    /// Whether `version` can express this operation at all.
    fn supports(&self, version: OcppVersion) -> bool;

    /// Send `op` to its station. Returns the message id of the call.
    async fn dispatch(
        &self,
        ctx: &CallContext,
        op: &PendingOperation,
        version: OcppVersion,
    ) -> Result<String, CorrelationError>;
}

/// Call state attached to dispatched operations, handed back to the
/// result handler when the station answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRef {
    pub kind: OperationKind,
    pub request_id: i32,
}

impl OperationRef {
    pub fn of(op: &PendingOperation) -> Self {
        Self {
            kind: op.kind,
            request_id: op.request_id,
        }
    }

    pub fn to_state(self) -> CallState {
        serde_json::to_value(self).ok()
    }

    pub fn from_state(state: &CallState) -> Option<Self> {
        state
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Listing {kind} operations failed: {source}")]
    List {
        kind: OperationKind,
        #[source]
        source: StoreError,
    },
}
