use crate::command::Command;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::event_loop::run_event_loop;
use crate::link::FlightLink;
use crate::state::{
    create_channels, Attitude, Battery, FlightMode, FlightStatus, GpsInfo, HomePosition,
    LinkState, Position, Speeds, StateChannels, Telemetry, VehicleIdentity, VehicleState,
};
use async_trait::async_trait;
use mavlink::common::{self, MavCmd};
use num_traits::FromPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Async MAVLink vehicle handle.
///
/// `Vehicle` is `Clone + Send + Sync`. Clones share the same connection.
/// When the last clone is dropped, the event loop is cancelled.
#[derive(Clone)]
pub struct Vehicle {
    inner: Arc<VehicleInner>,
}

struct VehicleInner {
    command_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    channels: StateChannels,
}

impl Drop for VehicleInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Vehicle {
    /// Connect using a mavlink address string (e.g. `udpin:0.0.0.0:14550`).
    /// Waits for the first vehicle HEARTBEAT before returning.
    pub async fn connect(address: &str) -> Result<Self, LinkError> {
        Self::connect_with_config(address, LinkConfig::default()).await
    }

    /// Connect via UDP. `bind_addr` is `host:port` to bind to (e.g. `0.0.0.0:14550`).
    pub async fn connect_udp(bind_addr: &str) -> Result<Self, LinkError> {
        Self::connect(&format!("udpin:{bind_addr}")).await
    }

    /// Connect via TCP. `addr` is `host:port` of the autopilot or SITL.
    pub async fn connect_tcp(addr: &str) -> Result<Self, LinkError> {
        Self::connect(&format!("tcpout:{addr}")).await
    }

    pub async fn connect_serial(port: &str, baud: u32) -> Result<Self, LinkError> {
        Self::connect(&format!("serial:{port}:{baud}")).await
    }

    pub async fn connect_with_config(address: &str, config: LinkConfig) -> Result<Self, LinkError> {
        let connection = mavlink::connect_async::<common::MavMessage>(address)
            .await
            .map_err(|err| LinkError::ConnectionFailed(err.to_string()))?;

        let (writers, channels) = create_channels();
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);
        let connect_timeout = config.connect_timeout;

        tokio::spawn(run_event_loop(
            connection,
            command_rx,
            writers,
            config,
            cancel.clone(),
        ));

        let vehicle = Vehicle {
            inner: Arc::new(VehicleInner {
                command_tx,
                cancel,
                channels,
            }),
        };

        let mut state_rx = vehicle.state();
        let heartbeat_wait = async {
            loop {
                if state_rx.borrow_and_update().has_heartbeat() {
                    return Ok::<(), LinkError>(());
                }
                state_rx
                    .changed()
                    .await
                    .map_err(|_| LinkError::Disconnected)?;
            }
        };

        tokio::select! {
            result = heartbeat_wait => result?,
            _ = tokio::time::sleep(connect_timeout) => {
                return Err(LinkError::Timeout);
            }
        }

        Ok(vehicle)
    }

    // --- Reactive state (watch channels) ---

    pub fn state(&self) -> watch::Receiver<VehicleState> {
        self.inner.channels.vehicle_state.clone()
    }

    pub fn telemetry(&self) -> watch::Receiver<Telemetry> {
        self.inner.channels.telemetry.clone()
    }

    pub fn home_position(&self) -> watch::Receiver<Option<HomePosition>> {
        self.inner.channels.home_position.clone()
    }

    pub fn link_state(&self) -> watch::Receiver<LinkState> {
        self.inner.channels.link_state.clone()
    }

    // --- Vehicle commands ---

    /// Arm the motors. `Ok(false)` means the autopilot refused (pre-arm checks).
    pub async fn arm(&self, force: bool) -> Result<bool, LinkError> {
        self.send_command(|reply| Command::ArmDisarm {
            arm: true,
            force,
            reply,
        })
        .await
    }

    pub async fn disarm(&self, force: bool) -> Result<bool, LinkError> {
        self.send_command(|reply| Command::ArmDisarm {
            arm: false,
            force,
            reply,
        })
        .await
    }

    pub async fn set_custom_mode(&self, custom_mode: u32) -> Result<(), LinkError> {
        self.send_command(|reply| Command::SetMode { custom_mode, reply })
            .await
    }

    pub async fn set_mode_by_name(&self, name: &str) -> Result<(), LinkError> {
        let state = self.inner.channels.vehicle_state.borrow().clone();
        let custom_mode = crate::modes::mode_number(state.autopilot, state.vehicle_type, name)
            .ok_or_else(|| LinkError::ModeNotAvailable(name.to_string()))?;
        self.set_custom_mode(custom_mode).await
    }

    pub async fn takeoff(&self, altitude_m: f32) -> Result<(), LinkError> {
        self.command_long(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude_m],
        )
        .await
    }

    /// Send a guided-mode position target; altitude is relative to home.
    pub async fn goto(&self, lat_deg: f64, lon_deg: f64, alt_m: f32) -> Result<(), LinkError> {
        let lat_e7 = (lat_deg * 1e7).round() as i32;
        let lon_e7 = (lon_deg * 1e7).round() as i32;
        self.send_command(|reply| Command::GuidedGoto {
            lat_e7,
            lon_e7,
            alt_m,
            reply,
        })
        .await
    }

    pub async fn command_long(&self, command: MavCmd, params: [f32; 7]) -> Result<(), LinkError> {
        self.send_command(|reply| Command::CommandLong {
            command,
            params,
            reply,
        })
        .await
    }

    /// Read a parameter; `Ok(None)` when the autopilot does not know the name.
    pub async fn param_read(&self, name: &str) -> Result<Option<f32>, LinkError> {
        let name = normalize_param_name(name);
        self.send_command(|reply| Command::ParamRead { name, reply })
            .await
    }

    /// Write a parameter and return the value the autopilot echoed back.
    pub async fn param_write(&self, name: &str, value: f32) -> Result<f32, LinkError> {
        let name = normalize_param_name(name);
        self.send_command(|reply| Command::ParamWrite { name, value, reply })
            .await
    }

    pub fn available_modes(&self) -> Vec<FlightMode> {
        let state = self.inner.channels.vehicle_state.borrow().clone();
        crate::modes::available_modes(state.autopilot, state.vehicle_type)
    }

    pub fn identity(&self) -> Option<VehicleIdentity> {
        let state = self.inner.channels.vehicle_state.borrow();
        if !state.has_heartbeat() {
            return None;
        }
        Some(VehicleIdentity {
            system_id: state.system_id,
            component_id: state.component_id,
            autopilot: state.autopilot,
            vehicle_type: state.vehicle_type,
        })
    }

    /// Gracefully disconnect from the vehicle.
    pub async fn disconnect(self) -> Result<(), LinkError> {
        let _ = self.inner.command_tx.send(Command::Shutdown).await;
        Ok(())
    }

    // --- Internal helpers ---

    async fn send_command<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, LinkError>>) -> Command,
    ) -> Result<T, LinkError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(make(tx))
            .await
            .map_err(|_| LinkError::Disconnected)?;
        rx.await.map_err(|_| LinkError::Disconnected)?
    }

    fn connected_telemetry(&self) -> Result<Telemetry, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }
        Ok(self.inner.channels.telemetry.borrow().clone())
    }
}

fn normalize_param_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

#[async_trait]
impl FlightLink for Vehicle {
    fn is_connected(&self) -> bool {
        !self.inner.command_tx.is_closed()
            && *self.inner.channels.link_state.borrow() == LinkState::Connected
    }

    fn identity(&self) -> Option<VehicleIdentity> {
        Vehicle::identity(self)
    }

    fn position(&self) -> Result<Position, LinkError> {
        let t = self.connected_telemetry()?;
        Ok(Position {
            latitude_deg: t.latitude_deg.unwrap_or(0.0),
            longitude_deg: t.longitude_deg.unwrap_or(0.0),
            altitude_m: t.altitude_m.unwrap_or(0.0),
        })
    }

    fn battery(&self) -> Result<Battery, LinkError> {
        let t = self.connected_telemetry()?;
        Ok(Battery {
            voltage_v: t.battery_voltage_v.unwrap_or(0.0),
            current_a: t.battery_current_a.unwrap_or(0.0),
            remaining_pct: t.battery_pct.unwrap_or(0.0),
        })
    }

    fn gps(&self) -> Result<GpsInfo, LinkError> {
        let t = self.connected_telemetry()?;
        Ok(GpsInfo {
            satellites: t.satellites.unwrap_or(0),
            fix_type: t.gps_fix_type.unwrap_or_default(),
        })
    }

    fn attitude(&self) -> Result<Attitude, LinkError> {
        let t = self.connected_telemetry()?;
        Ok(Attitude {
            roll_deg: t.roll_deg.unwrap_or(0.0),
            pitch_deg: t.pitch_deg.unwrap_or(0.0),
            yaw_deg: t.yaw_deg.unwrap_or(0.0),
        })
    }

    fn speeds(&self) -> Result<Speeds, LinkError> {
        let t = self.connected_telemetry()?;
        Ok(Speeds {
            ground_mps: t.ground_speed_mps.unwrap_or(0.0),
            air_mps: t.airspeed_mps.unwrap_or(0.0),
            climb_mps: t.climb_rate_mps.unwrap_or(0.0),
        })
    }

    fn status(&self) -> Result<FlightStatus, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }
        let state = self.inner.channels.vehicle_state.borrow();
        let mode = if state.mode_name.is_empty() {
            "UNKNOWN".to_string()
        } else {
            state.mode_name.clone()
        };
        Ok(FlightStatus {
            mode,
            armed: state.armed,
        })
    }

    fn home(&self) -> Result<Option<HomePosition>, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::Disconnected);
        }
        Ok(self.inner.channels.home_position.borrow().clone())
    }

    async fn arm_disarm(&self, arm: bool) -> Result<bool, LinkError> {
        if arm {
            self.arm(false).await
        } else {
            self.disarm(false).await
        }
    }

    async fn set_mode(&self, name: &str) -> Result<(), LinkError> {
        self.set_mode_by_name(name).await
    }

    async fn set_guided_waypoint(
        &self,
        lat_deg: f64,
        lon_deg: f64,
        alt_m: f32,
    ) -> Result<(), LinkError> {
        self.goto(lat_deg, lon_deg, alt_m).await
    }

    async fn send_raw_action(&self, command: u16, params: [f32; 7]) -> Result<(), LinkError> {
        let command = MavCmd::from_u16(command).ok_or(LinkError::UnknownCommandId(command))?;
        self.command_long(command, params).await
    }

    async fn read_parameter(&self, name: &str) -> Result<Option<f32>, LinkError> {
        self.param_read(name).await
    }

    async fn write_parameter(&self, name: &str, value: f32) -> Result<(), LinkError> {
        let echoed = self.param_write(name, value).await?;
        if echoed != value {
            debug!(name, requested = value, echoed, "autopilot stored a different value");
        }
        Ok(())
    }

    async fn wait_for_mode(&self, mode: &str, timeout: Duration) -> Option<bool> {
        let mut state_rx = self.state();
        let confirmed = async {
            loop {
                if state_rx
                    .borrow_and_update()
                    .mode_name
                    .eq_ignore_ascii_case(mode.trim())
                {
                    return true;
                }
                if state_rx.changed().await.is_err() {
                    return false;
                }
            }
        };
        Some(
            tokio::time::timeout(timeout, confirmed)
                .await
                .unwrap_or(false),
        )
    }
}
