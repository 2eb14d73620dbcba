use crate::error::LinkError;
use crate::state::{
    Attitude, Battery, FlightStatus, GpsInfo, HomePosition, Position, Speeds, VehicleIdentity,
};
use async_trait::async_trait;
use std::time::Duration;

/// `MAV_CMD_NAV_TAKEOFF`; altitude goes in param7.
pub const MAV_CMD_NAV_TAKEOFF: u16 = 22;
/// `MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN`; param1 = 1 reboots the autopilot.
pub const MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN: u16 = 246;

/// Primitive capabilities of a live vehicle link.
///
/// Every call may fail, and the link may have dropped since the previous
/// call succeeded; callers must not cache `is_connected()`.
#[async_trait]
pub trait FlightLink: Send + Sync {
    /// Whether the underlying transport is currently open.
    fn is_connected(&self) -> bool;

    fn identity(&self) -> Option<VehicleIdentity>;

    fn position(&self) -> Result<Position, LinkError>;
    fn battery(&self) -> Result<Battery, LinkError>;
    fn gps(&self) -> Result<GpsInfo, LinkError>;
    fn attitude(&self) -> Result<Attitude, LinkError>;
    fn speeds(&self) -> Result<Speeds, LinkError>;
    fn status(&self) -> Result<FlightStatus, LinkError>;
    fn home(&self) -> Result<Option<HomePosition>, LinkError>;

    /// Returns `Ok(false)` when the autopilot refuses, `Err` when the request
    /// could not be completed at all.
    async fn arm_disarm(&self, arm: bool) -> Result<bool, LinkError>;

    async fn set_mode(&self, name: &str) -> Result<(), LinkError>;

    async fn set_guided_waypoint(
        &self,
        lat_deg: f64,
        lon_deg: f64,
        alt_m: f32,
    ) -> Result<(), LinkError>;

    async fn send_raw_action(&self, command: u16, params: [f32; 7]) -> Result<(), LinkError>;

    async fn read_parameter(&self, name: &str) -> Result<Option<f32>, LinkError>;

    async fn write_parameter(&self, name: &str, value: f32) -> Result<(), LinkError>;

    /// Wait until the vehicle reports `mode` as active.
    ///
    /// `Some(true)` when confirmed, `Some(false)` on timeout, `None` when the
    /// link has no way of observing mode changes.
    async fn wait_for_mode(&self, _mode: &str, _timeout: Duration) -> Option<bool> {
        None
    }
}
