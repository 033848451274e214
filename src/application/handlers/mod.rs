//! Business handlers plugged into the registry

pub mod diagnostics;
pub mod heartbeat;

use std::sync::Arc;

pub use diagnostics::DiagnosticsHandler;
pub use heartbeat::HeartbeatHandler;

use super::actions::{v16, v201};
use super::errors::RegistryError;
use super::registry::HandlerRegistryBuilder;
use crate::domain::{ChargeStationStatusStore, DiagnosticsStatusStore};

/// Register every handler this CSMS ships with.
pub fn register_all(
    builder: &mut HandlerRegistryBuilder,
    status_store: Arc<dyn ChargeStationStatusStore>,
    diagnostics_store: Arc<dyn DiagnosticsStatusStore>,
) -> Result<(), RegistryError> {
    let heartbeat = Arc::new(HeartbeatHandler::new(status_store));
    builder.call::<v16::Heartbeat>(heartbeat.clone())?;
    builder.call::<v201::Heartbeat>(heartbeat)?;

    let diagnostics = Arc::new(DiagnosticsHandler::new(diagnostics_store));
    builder.call::<v16::DiagnosticsStatusNotification>(diagnostics.clone())?;
    builder.call::<v201::LogStatusNotification>(diagnostics.clone())?;
    builder.result::<v16::GetDiagnostics>(diagnostics.clone())?;
    builder.result::<v201::GetLog>(diagnostics)?;
    Ok(())
}
