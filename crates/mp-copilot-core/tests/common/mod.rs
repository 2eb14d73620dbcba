#![allow(dead_code)]

use async_trait::async_trait;
use mavkit::{
    Attitude, Battery, FlightLink, FlightStatus, GpsFixType, GpsInfo, HomePosition, LinkError,
    Position, Speeds, VehicleIdentity,
};
use mp_copilot_core::{
    AiBackend, BackendError, BackendReply, BackendStatus, QueryRequest, Severity, Transcript,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Route crate logs to the test writer. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Flight link
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Position,
    Battery,
    Gps,
    Attitude,
    Speeds,
    Status,
    Home,
    ArmDisarm(bool),
    SetMode(String),
    WaitForMode(String),
    Waypoint(f64, f64, f32),
    RawAction(u16, [f32; 7]),
    ReadParam(String),
    WriteParam(String, f32),
}

impl Call {
    /// Calls that ask the vehicle to do something.
    pub fn is_command(&self) -> bool {
        matches!(
            self,
            Call::ArmDisarm(_)
                | Call::SetMode(_)
                | Call::Waypoint(..)
                | Call::RawAction(..)
                | Call::WriteParam(..)
        )
    }
}

pub struct MockLink {
    pub connected: AtomicBool,
    pub position: Position,
    pub home: Option<HomePosition>,
    pub arm_accepts: bool,
    pub set_mode_fault: bool,
    pub battery_fault: bool,
    pub mode_ack: Option<bool>,
    pub params: Mutex<HashMap<String, f32>>,
    pub calls: Mutex<Vec<Call>>,
}

impl Default for MockLink {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(true),
            position: Position {
                latitude_deg: 47.3977,
                longitude_deg: 8.5456,
                altitude_m: 10.0,
            },
            home: Some(HomePosition {
                latitude_deg: 47.3970,
                longitude_deg: 8.5450,
                altitude_m: 488.0,
            }),
            arm_accepts: true,
            set_mode_fault: false,
            battery_fault: false,
            mode_ack: Some(true),
            params: Mutex::new(HashMap::from([("RTL_ALT".to_string(), 1500.0)])),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockLink {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_command).collect()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl FlightLink for MockLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn identity(&self) -> Option<VehicleIdentity> {
        None
    }

    fn position(&self) -> Result<Position, LinkError> {
        self.record(Call::Position);
        Ok(self.position)
    }

    fn battery(&self) -> Result<Battery, LinkError> {
        self.record(Call::Battery);
        if self.battery_fault {
            return Err(LinkError::Timeout);
        }
        Ok(Battery {
            voltage_v: 12.4,
            current_a: 1.5,
            remaining_pct: 80.0,
        })
    }

    fn gps(&self) -> Result<GpsInfo, LinkError> {
        self.record(Call::Gps);
        Ok(GpsInfo {
            satellites: 10,
            fix_type: GpsFixType::Fix3d,
        })
    }

    fn attitude(&self) -> Result<Attitude, LinkError> {
        self.record(Call::Attitude);
        Ok(Attitude::default())
    }

    fn speeds(&self) -> Result<Speeds, LinkError> {
        self.record(Call::Speeds);
        Ok(Speeds::default())
    }

    fn status(&self) -> Result<FlightStatus, LinkError> {
        self.record(Call::Status);
        Ok(FlightStatus {
            mode: "STABILIZE".into(),
            armed: false,
        })
    }

    fn home(&self) -> Result<Option<HomePosition>, LinkError> {
        self.record(Call::Home);
        Ok(self.home.clone())
    }

    async fn arm_disarm(&self, arm: bool) -> Result<bool, LinkError> {
        self.record(Call::ArmDisarm(arm));
        Ok(self.arm_accepts)
    }

    async fn set_mode(&self, name: &str) -> Result<(), LinkError> {
        self.record(Call::SetMode(name.to_string()));
        if self.set_mode_fault {
            return Err(LinkError::Io(std::io::Error::other("serial port /dev/ttyACM0 vanished")));
        }
        Ok(())
    }

    async fn set_guided_waypoint(&self, lat_deg: f64, lon_deg: f64, alt_m: f32) -> Result<(), LinkError> {
        self.record(Call::Waypoint(lat_deg, lon_deg, alt_m));
        Ok(())
    }

    async fn send_raw_action(&self, command: u16, params: [f32; 7]) -> Result<(), LinkError> {
        self.record(Call::RawAction(command, params));
        Ok(())
    }

    async fn read_parameter(&self, name: &str) -> Result<Option<f32>, LinkError> {
        self.record(Call::ReadParam(name.to_string()));
        Ok(self.params.lock().unwrap().get(name).copied())
    }

    async fn write_parameter(&self, name: &str, value: f32) -> Result<(), LinkError> {
        self.record(Call::WriteParam(name.to_string(), value));
        self.params.lock().unwrap().insert(name.to_string(), value);
        Ok(())
    }

    async fn wait_for_mode(&self, mode: &str, _timeout: Duration) -> Option<bool> {
        self.record(Call::WaitForMode(mode.to_string()));
        self.mode_ack
    }
}

// ---------------------------------------------------------------------------
// AI backend
// ---------------------------------------------------------------------------

/// Scripted backend. With a gate, each query blocks until the gate is
/// notified or the request is cancelled.
#[derive(Default)]
pub struct MockBackend {
    pub healthy: bool,
    pub status: Option<BackendStatus>,
    pub gate: Option<Arc<Notify>>,
    pub started: Notify,
    pub replies: Mutex<Vec<Result<BackendReply, BackendError>>>,
    pub requests: Mutex<Vec<QueryRequest>>,
}

impl MockBackend {
    pub fn replying(reply: Result<BackendReply, BackendError>) -> Self {
        let backend = Self::default();
        backend.replies.lock().unwrap().push(reply);
        backend
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn with_reply(self, reply: Result<BackendReply, BackendError>) -> Self {
        self.replies.lock().unwrap().push(reply);
        self
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiBackend for MockBackend {
    async fn health_check(&self) -> bool {
        self.healthy
    }

    async fn status(&self) -> Result<BackendStatus, BackendError> {
        self.status.clone().ok_or(BackendError::Unavailable)
    }

    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<BackendReply, BackendError> {
        self.requests.lock().unwrap().push(request);
        self.started.notify_one();
        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                _ = gate.notified() => {}
            }
        }
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Ok(BackendReply::text("ok")))
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingTranscript {
    lines: Mutex<Vec<(String, Severity)>>,
    pub removed: AtomicUsize,
    pub input_cleared: AtomicUsize,
}

impl RecordingTranscript {
    pub fn lines(&self) -> Vec<(String, Severity)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|(text, _)| text).collect()
    }
}

impl Transcript for RecordingTranscript {
    fn append(&self, text: &str, severity: Severity) {
        self.lines.lock().unwrap().push((text.to_string(), severity));
    }

    fn remove_last(&self) {
        self.removed.fetch_add(1, Ordering::SeqCst);
        self.lines.lock().unwrap().pop();
    }

    fn scroll_to_end(&self) {}

    fn clear_input(&self) {
        self.input_cleared.fetch_add(1, Ordering::SeqCst);
    }
}
