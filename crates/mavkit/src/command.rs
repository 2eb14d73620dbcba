use crate::error::LinkError;
use mavlink::common::MavCmd;
use tokio::sync::oneshot;

type Reply<T> = oneshot::Sender<Result<T, LinkError>>;

/// Requests sent from `Vehicle` handles to the event loop.
pub(crate) enum Command {
    ArmDisarm {
        arm: bool,
        force: bool,
        reply: Reply<bool>,
    },
    SetMode {
        custom_mode: u32,
        reply: Reply<()>,
    },
    CommandLong {
        command: MavCmd,
        params: [f32; 7],
        reply: Reply<()>,
    },
    GuidedGoto {
        lat_e7: i32,
        lon_e7: i32,
        alt_m: f32,
        reply: Reply<()>,
    },
    ParamRead {
        name: String,
        reply: Reply<Option<f32>>,
    },
    ParamWrite {
        name: String,
        value: f32,
        reply: Reply<f32>,
    },
    Shutdown,
}
