use crate::command::Command;
use crate::config::LinkConfig;
use crate::error::LinkError;
use crate::state::{
    AutopilotType, GpsFixType, HomePosition, LinkState, StateWriters, SystemStatus, VehicleState,
    VehicleType,
};
use mavlink::common::{self, MavCmd, MavModeFlag};
use mavlink::{AsyncMavConnection, MavHeader};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub(crate) type Connection = Box<dyn AsyncMavConnection<common::MavMessage> + Sync + Send>;

const MAGIC_FORCE_ARM_VALUE: f32 = 2989.0;
const MAGIC_FORCE_DISARM_VALUE: f32 = 21196.0;
const HOME_POSITION_MESSAGE_ID: f32 = 242.0;
const PARAM_ID_LEN: usize = 16;

/// Remote vehicle identity learned from heartbeats.
#[derive(Debug, Clone, Copy)]
struct VehicleTarget {
    system_id: u8,
    component_id: u8,
    autopilot: common::MavAutopilot,
    vehicle_type: common::MavType,
}

/// Mutable per-connection bookkeeping, kept apart from `Link` so that the
/// select branches can borrow the connection while handlers mutate this.
#[derive(Default)]
struct Session {
    target: Option<VehicleTarget>,
    home_requested: bool,
}

impl Session {
    fn target(&self) -> Result<VehicleTarget, LinkError> {
        self.target.ok_or(LinkError::IdentityUnknown)
    }
}

enum Ack {
    Accepted,
    Rejected(common::MavResult),
}

struct Link {
    connection: Connection,
    writers: StateWriters,
    config: LinkConfig,
    cancel: CancellationToken,
}

pub(crate) async fn run_event_loop(
    connection: Connection,
    mut command_rx: mpsc::Receiver<Command>,
    writers: StateWriters,
    config: LinkConfig,
    cancel: CancellationToken,
) {
    let link = Link {
        connection,
        writers,
        config,
        cancel,
    };
    let mut session = Session::default();

    let _ = link.writers.link_state.send(LinkState::Connected);

    loop {
        tokio::select! {
            biased;

            _ = link.cancel.cancelled() => {
                debug!("event loop cancelled");
                let _ = link.writers.link_state.send(LinkState::Disconnected);
                break;
            }
            Some(cmd) = command_rx.recv() => {
                if matches!(cmd, Command::Shutdown) {
                    debug!("event loop shutdown requested");
                    let _ = link.writers.link_state.send(LinkState::Disconnected);
                    break;
                }
                link.handle_command(cmd, &mut session).await;
            }
            result = link.connection.recv() => {
                match result {
                    Ok((header, msg)) => {
                        link.ingest(&mut session, &header, &msg);
                        if !session.home_requested && link.config.auto_request_home {
                            if let Some(target) = session.target {
                                link.request_home_position(&target).await;
                                session.home_requested = true;
                            }
                        }
                    }
                    Err(err) => {
                        warn!("MAVLink recv error: {err}");
                        let _ = link.writers.link_state.send(LinkState::Error(err.to_string()));
                        break;
                    }
                }
            }
        }
    }
}

impl Link {
    async fn handle_command(&self, cmd: Command, session: &mut Session) {
        match cmd {
            Command::ArmDisarm { arm, force, reply } => {
                let _ = reply.send(self.arm_disarm(session, arm, force).await);
            }
            Command::SetMode { custom_mode, reply } => {
                let _ = reply.send(self.set_mode(session, custom_mode).await);
            }
            Command::CommandLong {
                command,
                params,
                reply,
            } => {
                let _ = reply.send(self.command_long(session, command, params).await);
            }
            Command::GuidedGoto {
                lat_e7,
                lon_e7,
                alt_m,
                reply,
            } => {
                let _ = reply.send(self.guided_goto(session, lat_e7, lon_e7, alt_m).await);
            }
            Command::ParamRead { name, reply } => {
                let _ = reply.send(self.param_read(session, &name).await);
            }
            Command::ParamWrite { name, value, reply } => {
                let _ = reply.send(self.param_write(session, &name, value).await);
            }
            // Handled by the main loop.
            Command::Shutdown => {}
        }
    }

    // -----------------------------------------------------------------------
    // Wire helpers
    // -----------------------------------------------------------------------

    async fn send(&self, message: common::MavMessage) -> Result<(), LinkError> {
        self.connection
            .send(
                &MavHeader {
                    system_id: self.config.gcs_system_id,
                    component_id: self.config.gcs_component_id,
                    sequence: 0,
                },
                &message,
            )
            .await
            .map(|_| ())
            .map_err(|err| LinkError::Io(std::io::Error::other(err.to_string())))
    }

    fn ingest(&self, session: &mut Session, header: &MavHeader, msg: &common::MavMessage) {
        update_target(&mut session.target, header, msg);
        apply_message(&self.writers, session.target.as_ref(), msg);
    }

    /// Receive until `pick` matches, the timeout elapses (`Ok(None)`), or the
    /// loop is cancelled. Every message received meanwhile still updates state.
    async fn await_message<T>(
        &self,
        session: &mut Session,
        timeout: Duration,
        mut pick: impl FnMut(&common::MavMessage) -> Option<T>,
    ) -> Result<Option<T>, LinkError> {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(LinkError::Cancelled),
                _ = &mut deadline => return Ok(None),
                result = self.connection.recv() => {
                    let (header, msg) = result
                        .map_err(|err| LinkError::Io(std::io::Error::other(err.to_string())))?;
                    self.ingest(session, &header, &msg);
                    if let Some(found) = pick(&msg) {
                        return Ok(Some(found));
                    }
                }
            }
        }
    }

    async fn command_long_ack(
        &self,
        session: &mut Session,
        command: MavCmd,
        params: [f32; 7],
    ) -> Result<Ack, LinkError> {
        let target = session.target()?;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!(?command, attempt, "resending COMMAND_LONG");
            }
            self.send(common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
                target_system: target.system_id,
                target_component: target.component_id,
                command,
                confirmation: attempt,
                param1: params[0],
                param2: params[1],
                param3: params[2],
                param4: params[3],
                param5: params[4],
                param6: params[5],
                param7: params[6],
            }))
            .await?;

            let result = self
                .await_message(session, self.config.command_timeout, |msg| match msg {
                    common::MavMessage::COMMAND_ACK(ack) if ack.command == command => {
                        Some(ack.result)
                    }
                    _ => None,
                })
                .await?;

            match result {
                Some(common::MavResult::MAV_RESULT_ACCEPTED)
                | Some(common::MavResult::MAV_RESULT_IN_PROGRESS) => return Ok(Ack::Accepted),
                Some(result) => return Ok(Ack::Rejected(result)),
                None => continue,
            }
        }
        Err(LinkError::Timeout)
    }

    async fn request_home_position(&self, target: &VehicleTarget) {
        let request = common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
            target_system: target.system_id,
            target_component: target.component_id,
            command: MavCmd::MAV_CMD_REQUEST_MESSAGE,
            confirmation: 0,
            param1: HOME_POSITION_MESSAGE_ID,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7: 0.0,
        });
        if let Err(err) = self.send(request).await {
            debug!("home position request not sent: {err}");
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    async fn arm_disarm(
        &self,
        session: &mut Session,
        arm: bool,
        force: bool,
    ) -> Result<bool, LinkError> {
        let param1 = if arm { 1.0 } else { 0.0 };
        let param2 = match (force, arm) {
            (false, _) => 0.0,
            (true, true) => MAGIC_FORCE_ARM_VALUE,
            (true, false) => MAGIC_FORCE_DISARM_VALUE,
        };
        let ack = self
            .command_long_ack(
                session,
                MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
                [param1, param2, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
            .await?;
        match ack {
            Ack::Accepted => Ok(true),
            Ack::Rejected(result) => {
                warn!(arm, ?result, "arm/disarm refused by autopilot");
                Ok(false)
            }
        }
    }

    async fn set_mode(&self, session: &mut Session, custom_mode: u32) -> Result<(), LinkError> {
        let ack = self
            .command_long_ack(
                session,
                MavCmd::MAV_CMD_DO_SET_MODE,
                [1.0, custom_mode as f32, 0.0, 0.0, 0.0, 0.0, 0.0],
            )
            .await;

        match ack {
            Ok(Ack::Accepted) => return Ok(()),
            Ok(Ack::Rejected(result)) => {
                debug!(custom_mode, ?result, "DO_SET_MODE refused; watching heartbeats");
            }
            Err(LinkError::Timeout) => {
                debug!(custom_mode, "DO_SET_MODE unacknowledged; watching heartbeats");
            }
            Err(err) => return Err(err),
        }

        // Older firmware switches without acknowledging; trust the heartbeat.
        let confirmed = self
            .await_message(session, self.config.mode_confirm_timeout, |msg| match msg {
                common::MavMessage::HEARTBEAT(hb) if hb.custom_mode == custom_mode => Some(()),
                _ => None,
            })
            .await?;

        confirmed.ok_or_else(|| LinkError::CommandRejected {
            command: format!("DO_SET_MODE({custom_mode})"),
            result: "no confirming HEARTBEAT".to_string(),
        })
    }

    async fn command_long(
        &self,
        session: &mut Session,
        command: MavCmd,
        params: [f32; 7],
    ) -> Result<(), LinkError> {
        match self.command_long_ack(session, command, params).await? {
            Ack::Accepted => Ok(()),
            Ack::Rejected(result) => Err(LinkError::CommandRejected {
                command: format!("{command:?}"),
                result: format!("{result:?}"),
            }),
        }
    }

    async fn guided_goto(
        &self,
        session: &mut Session,
        lat_e7: i32,
        lon_e7: i32,
        alt_m: f32,
    ) -> Result<(), LinkError> {
        let target = session.target()?;
        // Position only: ignore velocity, acceleration and yaw fields.
        let type_mask = common::PositionTargetTypemask::from_bits_truncate(0x07F8);

        self.send(common::MavMessage::SET_POSITION_TARGET_GLOBAL_INT(
            common::SET_POSITION_TARGET_GLOBAL_INT_DATA {
                time_boot_ms: 0,
                target_system: target.system_id,
                target_component: target.component_id,
                coordinate_frame: common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT,
                type_mask,
                lat_int: lat_e7,
                lon_int: lon_e7,
                alt: alt_m,
                vx: 0.0,
                vy: 0.0,
                vz: 0.0,
                afx: 0.0,
                afy: 0.0,
                afz: 0.0,
                yaw: 0.0,
                yaw_rate: 0.0,
            },
        ))
        .await
    }

    async fn param_read(&self, session: &mut Session, name: &str) -> Result<Option<f32>, LinkError> {
        let target = session.target()?;
        let param_id = encode_param_id(name)?;

        for _attempt in 0..=self.config.max_retries {
            self.send(common::MavMessage::PARAM_REQUEST_READ(
                common::PARAM_REQUEST_READ_DATA {
                    param_index: -1,
                    target_system: target.system_id,
                    target_component: target.component_id,
                    param_id: param_id.into(),
                },
            ))
            .await?;

            let value = self
                .await_message(session, self.config.param_timeout, |msg| match msg {
                    common::MavMessage::PARAM_VALUE(data)
                        if decode_param_id(&data.param_id[..]) == name =>
                    {
                        Some(data.param_value)
                    }
                    _ => None,
                })
                .await?;
            if value.is_some() {
                return Ok(value);
            }
        }

        // ArduPilot stays silent for names it does not know.
        debug!(name, "no PARAM_VALUE received; treating parameter as absent");
        Ok(None)
    }

    async fn param_write(&self, session: &mut Session, name: &str, value: f32) -> Result<f32, LinkError> {
        let target = session.target()?;
        let param_id = encode_param_id(name)?;

        for _attempt in 0..=self.config.max_retries {
            self.send(common::MavMessage::PARAM_SET(common::PARAM_SET_DATA {
                param_value: value,
                target_system: target.system_id,
                target_component: target.component_id,
                param_id: param_id.into(),
                param_type: common::MavParamType::MAV_PARAM_TYPE_REAL32,
            }))
            .await?;

            let echoed = self
                .await_message(session, self.config.param_timeout, |msg| match msg {
                    common::MavMessage::PARAM_VALUE(data)
                        if decode_param_id(&data.param_id[..]) == name =>
                    {
                        Some(data.param_value)
                    }
                    _ => None,
                })
                .await?;
            if let Some(echoed) = echoed {
                return Ok(echoed);
            }
        }
        Err(LinkError::Timeout)
    }
}

// ---------------------------------------------------------------------------
// State tracking
// ---------------------------------------------------------------------------

fn update_target(
    target: &mut Option<VehicleTarget>,
    header: &MavHeader,
    message: &common::MavMessage,
) {
    if header.system_id == 0 {
        return;
    }

    match message {
        // Other ground stations on the same link are not vehicles.
        common::MavMessage::HEARTBEAT(hb) if hb.mavtype == common::MavType::MAV_TYPE_GCS => {}
        common::MavMessage::HEARTBEAT(hb) => {
            *target = Some(VehicleTarget {
                system_id: header.system_id,
                component_id: header.component_id,
                autopilot: hb.autopilot,
                vehicle_type: hb.mavtype,
            });
        }
        _ if target.is_none() => {
            *target = Some(VehicleTarget {
                system_id: header.system_id,
                component_id: header.component_id,
                autopilot: common::MavAutopilot::MAV_AUTOPILOT_GENERIC,
                vehicle_type: common::MavType::MAV_TYPE_GENERIC,
            });
        }
        _ => {}
    }
}

fn apply_message(
    writers: &StateWriters,
    target: Option<&VehicleTarget>,
    message: &common::MavMessage,
) {
    match message {
        common::MavMessage::HEARTBEAT(hb) => {
            let Some(target) = target else { return };
            if hb.mavtype == common::MavType::MAV_TYPE_GCS {
                return;
            }
            let autopilot = AutopilotType::from_mav(target.autopilot);
            let vehicle_type = VehicleType::from_mav(target.vehicle_type);
            let _ = writers.vehicle_state.send(VehicleState {
                system_id: target.system_id,
                component_id: target.component_id,
                armed: hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED),
                custom_mode: hb.custom_mode,
                mode_name: crate::modes::mode_name(autopilot, vehicle_type, hb.custom_mode),
                system_status: SystemStatus::from_mav(hb.system_status),
                vehicle_type,
                autopilot,
            });
        }
        common::MavMessage::GLOBAL_POSITION_INT(data) => {
            writers.telemetry.send_modify(|t| {
                t.latitude_deg = Some(data.lat as f64 / 1e7);
                t.longitude_deg = Some(data.lon as f64 / 1e7);
                t.altitude_m = Some(data.relative_alt as f64 / 1000.0);
                if data.hdg != u16::MAX {
                    t.heading_deg = Some(data.hdg as f64 / 100.0);
                }
            });
        }
        common::MavMessage::VFR_HUD(data) => {
            writers.telemetry.send_modify(|t| {
                t.ground_speed_mps = Some(data.groundspeed as f64);
                t.airspeed_mps = Some(data.airspeed as f64);
                t.climb_rate_mps = Some(data.climb as f64);
                t.heading_deg = Some(data.heading as f64);
            });
        }
        common::MavMessage::ATTITUDE(data) => {
            writers.telemetry.send_modify(|t| {
                t.roll_deg = Some((data.roll as f64).to_degrees());
                t.pitch_deg = Some((data.pitch as f64).to_degrees());
                t.yaw_deg = Some((data.yaw as f64).to_degrees());
            });
        }
        common::MavMessage::SYS_STATUS(data) => {
            writers.telemetry.send_modify(|t| {
                if data.voltage_battery != u16::MAX {
                    t.battery_voltage_v = Some(data.voltage_battery as f64 / 1000.0);
                }
                if data.current_battery >= 0 {
                    t.battery_current_a = Some(data.current_battery as f64 / 100.0);
                }
                if data.battery_remaining >= 0 {
                    t.battery_pct = Some(data.battery_remaining as f64);
                }
            });
        }
        common::MavMessage::GPS_RAW_INT(data) => {
            writers.telemetry.send_modify(|t| {
                t.gps_fix_type = Some(GpsFixType::from_raw(data.fix_type as u8));
                if data.satellites_visible != u8::MAX {
                    t.satellites = Some(data.satellites_visible);
                }
            });
        }
        common::MavMessage::HOME_POSITION(data) => {
            let _ = writers.home_position.send(Some(HomePosition {
                latitude_deg: data.latitude as f64 / 1e7,
                longitude_deg: data.longitude as f64 / 1e7,
                altitude_m: (data.altitude as f64 / 1000.0) as f32,
            }));
        }
        _ => {
            trace!("unhandled message type");
        }
    }
}

/// NUL-padded 16-byte parameter id as used by PARAM_* messages.
fn encode_param_id(name: &str) -> Result<[u8; PARAM_ID_LEN], LinkError> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() > PARAM_ID_LEN || !name.is_ascii() {
        return Err(LinkError::InvalidParamName(name.to_string()));
    }
    let mut id = [0u8; PARAM_ID_LEN];
    id[..bytes.len()].copy_from_slice(bytes);
    Ok(id)
}

fn decode_param_id(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}
