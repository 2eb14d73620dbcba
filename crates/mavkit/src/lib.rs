mod command;
pub mod config;
pub mod error;
mod event_loop;
pub mod link;
mod modes;
pub mod state;
pub mod vehicle;

pub use config::LinkConfig;
pub use error::LinkError;
pub use link::{FlightLink, MAV_CMD_NAV_TAKEOFF, MAV_CMD_PREFLIGHT_REBOOT_SHUTDOWN};
pub use vehicle::Vehicle;

pub use state::{
    Attitude, AutopilotType, Battery, FlightMode, FlightStatus, GpsFixType, GpsInfo, HomePosition,
    LinkState, Position, Speeds, SystemStatus, Telemetry, VehicleIdentity, VehicleState,
    VehicleType,
};
