//! OCPP 1.6 actions

use rust_ocpp::v1_6::messages::diagnostics_status_notification::{
    DiagnosticsStatusNotificationRequest, DiagnosticsStatusNotificationResponse,
};
use rust_ocpp::v1_6::messages::get_diagnostics::{GetDiagnosticsRequest, GetDiagnosticsResponse};
use rust_ocpp::v1_6::messages::heart_beat::{HeartbeatRequest, HeartbeatResponse};

use crate::domain::{Action, OcppVersion};

pub struct Heartbeat;

impl Action for Heartbeat {
    const NAME: &'static str = "Heartbeat";
    const VERSION: OcppVersion = OcppVersion::V16;
    type Request = HeartbeatRequest;
    type Response = HeartbeatResponse;
}

pub struct DiagnosticsStatusNotification;

impl Action for DiagnosticsStatusNotification {
    const NAME: &'static str = "DiagnosticsStatusNotification";
    const VERSION: OcppVersion = OcppVersion::V16;
    type Request = DiagnosticsStatusNotificationRequest;
    type Response = DiagnosticsStatusNotificationResponse;
}

/// CSMS-initiated: ask the station to upload its diagnostics file.
pub struct GetDiagnostics;

impl Action for GetDiagnostics {
    const NAME: &'static str = "GetDiagnostics";
    const VERSION: OcppVersion = OcppVersion::V16;
    type Request = GetDiagnosticsRequest;
    type Response = GetDiagnosticsResponse;
}
