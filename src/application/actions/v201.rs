//! OCPP 2.0.1 actions

use rust_ocpp::v2_0_1::messages::get_log::{GetLogRequest, GetLogResponse};
use rust_ocpp::v2_0_1::messages::heartbeat::{HeartbeatRequest, HeartbeatResponse};
use rust_ocpp::v2_0_1::messages::log_status_notification::{
    LogStatusNotificationRequest, LogStatusNotificationResponse,
};

use crate::domain::{Action, OcppVersion};

pub struct Heartbeat;

impl Action for Heartbeat {
    const NAME: &'static str = "Heartbeat";
    const VERSION: OcppVersion = OcppVersion::V201;
    type Request = HeartbeatRequest;
    type Response = HeartbeatResponse;
}

pub struct LogStatusNotification;

impl Action for LogStatusNotification {
    const NAME: &'static str = "LogStatusNotification";
    const VERSION: OcppVersion = OcppVersion::V201;
    type Request = LogStatusNotificationRequest;
    type Response = LogStatusNotificationResponse;
}

/// CSMS-initiated: ask the station to upload a diagnostics or security log.
pub struct GetLog;

impl Action for GetLog {
    const NAME: &'static str = "GetLog";
    const VERSION: OcppVersion = OcppVersion::V201;
    type Request = GetLogRequest;
    type Response = GetLogResponse;
}
