use mavkit::{FlightLink, LinkError};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatterySnapshot {
    pub voltage: f64,
    pub current: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub satellites: u8,
    pub fix_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSnapshot {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedSnapshot {
    pub ground_speed: f64,
    pub air_speed: f64,
    pub climb_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub mode: String,
    pub armed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub battery: BatterySnapshot,
    pub gps: GpsSnapshot,
    pub attitude: AttitudeSnapshot,
    pub speed: SpeedSnapshot,
    pub status: StatusSnapshot,
}

/// Point-in-time vehicle state sent alongside a query.
///
/// Either complete or empty; an empty snapshot serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot(Option<VehicleSnapshot>);

impl TelemetrySnapshot {
    pub fn empty() -> Self {
        Self(None)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn vehicle(&self) -> Option<&VehicleSnapshot> {
        self.0.as_ref()
    }

    /// Heuristic for "a real vehicle is on the other end": any battery
    /// voltage, any satellites, or a known flight mode.
    pub fn indicates_live_vehicle(&self) -> bool {
        let Some(snapshot) = &self.0 else {
            return false;
        };
        snapshot.battery.voltage > 0.0
            || snapshot.gps.satellites > 0
            || !(snapshot.status.mode.is_empty() || snapshot.status.mode == "UNKNOWN")
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

impl Serialize for TelemetrySnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.0 {
            Some(snapshot) => snapshot.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

impl From<VehicleSnapshot> for TelemetrySnapshot {
    fn from(snapshot: VehicleSnapshot) -> Self {
        Self(Some(snapshot))
    }
}

/// Reads vehicle state for the assistant without ever commanding the link.
#[derive(Clone, Default)]
pub struct Snapshotter {
    link: Option<Arc<dyn FlightLink>>,
}

impl Snapshotter {
    pub fn new(link: Option<Arc<dyn FlightLink>>) -> Self {
        Self { link }
    }

    /// All-or-nothing read: any unavailable piece yields an empty snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let Some(link) = &self.link else {
            return TelemetrySnapshot::empty();
        };
        if !link.is_connected() {
            return TelemetrySnapshot::empty();
        }
        match read_all(link.as_ref()) {
            Ok(snapshot) => snapshot.into(),
            Err(err) => {
                debug!("telemetry snapshot unavailable: {err}");
                TelemetrySnapshot::empty()
            }
        }
    }
}

fn read_all(link: &dyn FlightLink) -> Result<VehicleSnapshot, LinkError> {
    let battery = link.battery()?;
    let position = link.position()?;
    let gps = link.gps()?;
    let attitude = link.attitude()?;
    let speeds = link.speeds()?;
    let status = link.status()?;

    Ok(VehicleSnapshot {
        battery: BatterySnapshot {
            voltage: battery.voltage_v,
            current: battery.current_a,
            remaining: battery.remaining_pct,
        },
        gps: GpsSnapshot {
            latitude: position.latitude_deg,
            longitude: position.longitude_deg,
            altitude: position.altitude_m,
            satellites: gps.satellites,
            fix_type: gps.fix_type.label().to_string(),
        },
        attitude: AttitudeSnapshot {
            roll: attitude.roll_deg,
            pitch: attitude.pitch_deg,
            yaw: attitude.yaw_deg,
        },
        speed: SpeedSnapshot {
            ground_speed: speeds.ground_mps,
            air_speed: speeds.air_mps,
            climb_rate: speeds.climb_mps,
        },
        status: StatusSnapshot {
            mode: status.mode,
            armed: status.armed,
        },
    })
}
