use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    /// How long to wait for a COMMAND_ACK before resending.
    pub command_timeout: Duration,
    /// How long to wait for a PARAM_VALUE before resending.
    pub param_timeout: Duration,
    pub max_retries: u8,
    /// Time allowed for a HEARTBEAT confirming a mode change when DO_SET_MODE
    /// is not acknowledged.
    pub mode_confirm_timeout: Duration,
    pub auto_request_home: bool,
    pub command_buffer_size: usize,
    pub connect_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 255,
            gcs_component_id: 190,
            command_timeout: Duration::from_millis(1500),
            param_timeout: Duration::from_millis(1000),
            max_retries: 3,
            mode_confirm_timeout: Duration::from_secs(2),
            auto_request_home: true,
            command_buffer_size: 32,
            connect_timeout: Duration::from_secs(30),
        }
    }
}
