use crate::backend::{AiBackend, AssistMode, BackendReply, QueryRequest};
use crate::config::CopilotConfig;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::{BackendError, CommandError};
use crate::notice::{Notice, Severity, Transcript};
use crate::telemetry::Snapshotter;
use mavkit::FlightLink;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const AGENT_MODE_WARNING: &str = "[System] ⚠ WARNING: Agent Mode enabled. AI can now control drone functions including ARM, TAKEOFF, LAND, and movement commands. Use with caution!";
const ASK_MODE_NOTICE: &str =
    "[System] ✓ Ask Mode enabled. AI is in read-only mode and cannot execute commands.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InFlight,
    Cancelling,
}

/// What became of one `submit` call.
#[derive(Debug)]
pub enum Turn {
    /// Blank message, or another request was already in flight.
    Ignored,
    /// The assistant answered. `outcome` is set when a command was dispatched.
    Answered {
        reply: String,
        outcome: Option<Outcome>,
    },
    Failed(BackendError),
    Cancelled,
}

fn or_unknown(name: &str) -> &str {
    if name.trim().is_empty() {
        "unknown"
    } else {
        name
    }
}

struct Inner {
    phase: Phase,
    /// Present only while the query itself is outstanding.
    cancel: Option<CancellationToken>,
    mode: AssistMode,
    model: String,
}

/// Puts the controller back to Idle however a submit future ends,
/// including when the host drops it mid-query.
struct IdleOnDrop<'a>(&'a Controller);

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        let mut inner = self.0.lock();
        inner.phase = Phase::Idle;
        inner.cancel = None;
    }
}

/// Runs one assistant round trip at a time and writes its progress to the
/// transcript.
pub struct Controller {
    backend: Arc<dyn AiBackend>,
    transcript: Arc<dyn Transcript>,
    snapshotter: Snapshotter,
    dispatcher: Option<Dispatcher>,
    inner: Mutex<Inner>,
}

impl Controller {
    pub fn new(
        config: &CopilotConfig,
        backend: Arc<dyn AiBackend>,
        transcript: Arc<dyn Transcript>,
        link: Option<Arc<dyn FlightLink>>,
    ) -> Self {
        let dispatcher = link
            .clone()
            .map(|link| Dispatcher::new(link, config.settle.clone()));
        Self {
            backend,
            transcript,
            snapshotter: Snapshotter::new(link),
            dispatcher,
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                cancel: None,
                mode: config.mode,
                model: config.model.clone(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn mode(&self) -> AssistMode {
        self.lock().mode
    }

    pub fn model(&self) -> String {
        self.lock().model.clone()
    }

    /// Switch between Agent and Ask. Announces the change in the transcript.
    pub fn set_mode(&self, mode: AssistMode) {
        {
            let mut inner = self.lock();
            if inner.mode == mode {
                return;
            }
            inner.mode = mode;
        }
        info!(%mode, "assist mode changed");
        let text = match mode {
            AssistMode::Agent => AGENT_MODE_WARNING,
            AssistMode::Ask => ASK_MODE_NOTICE,
        };
        self.transcript.post(&Notice::new(text, Severity::System));
    }

    pub fn set_model(&self, model: &str) {
        let model = model.trim();
        if model.is_empty() {
            return;
        }
        self.lock().model = model.to_string();
        debug!(model, "model selected");
    }

    /// Models the operator can choose from, current selection first.
    pub async fn available_models(&self) -> Vec<String> {
        let mut models = self.backend.available_models().await;
        let current = self.model();
        models.retain(|m| *m != current);
        models.insert(0, current);
        models
    }

    /// Probe the backend and report the result in the transcript, with the
    /// serving model and backend when the service names them.
    pub async fn check_backend(&self) -> bool {
        let (healthy, notice) =
            match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.backend.health_check()).await {
                Ok(true) => (true, Notice::system(self.connected_summary().await)),
                Ok(false) => (
                    false,
                    Notice::system("AI Backend not available. Please start the backend server."),
                ),
                Err(_) => (false, Notice::system("Could not check AI backend status")),
            };
        self.transcript.post(&notice);
        healthy
    }

    async fn connected_summary(&self) -> String {
        match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, self.backend.status()).await {
            Ok(Ok(status)) => format!(
                "AI Backend connected ✓ (model: {}, backend: {})",
                or_unknown(&status.model),
                or_unknown(&status.backend)
            ),
            _ => "AI Backend connected ✓".to_string(),
        }
    }

    /// Ask the assistant about `message` and act on its reply.
    ///
    /// A no-op while another request is in flight.
    pub async fn submit(&self, message: &str) -> Turn {
        let message = message.trim();
        if message.is_empty() {
            return Turn::Ignored;
        }

        let (cancel, mode, model) = {
            let mut inner = self.lock();
            if inner.phase != Phase::Idle {
                debug!("request already in flight; ignoring submit");
                return Turn::Ignored;
            }
            let cancel = CancellationToken::new();
            inner.phase = Phase::InFlight;
            inner.cancel = Some(cancel.clone());
            (cancel, inner.mode, inner.model.clone())
        };
        let _idle = IdleOnDrop(self);

        self.transcript.post(&Notice::user(message));
        self.transcript.clear_input();
        self.transcript.post(&Notice::thinking());

        let telemetry = self.snapshotter.snapshot();
        debug!(
            empty = telemetry.is_empty(),
            live_vehicle = telemetry.indicates_live_vehicle(),
            "querying assistant"
        );

        let result = self
            .backend
            .query(
                QueryRequest {
                    message: message.to_string(),
                    mode,
                    model,
                    telemetry,
                },
                cancel,
            )
            .await;

        // Whichever of completion and cancel takes the lock first decides.
        let cancelled = {
            let mut inner = self.lock();
            inner.cancel = None;
            inner.phase == Phase::Cancelling || matches!(result, Err(BackendError::Cancelled))
        };

        self.transcript.remove_last();

        if cancelled {
            self.transcript.post(&Notice::cancelled());
            Turn::Cancelled
        } else {
            match result {
                Ok(reply) => self.answer(reply, mode).await,
                Err(err) => {
                    self.transcript.post(&Notice::assistant_error(&err));
                    Turn::Failed(err)
                }
            }
        }
    }

    /// Abort the outstanding query. Returns whether there was one to abort;
    /// a command already being executed is not interrupted.
    pub fn cancel(&self) -> bool {
        let mut inner = self.lock();
        if inner.phase != Phase::InFlight {
            return false;
        }
        let Some(token) = inner.cancel.take() else {
            return false;
        };
        inner.phase = Phase::Cancelling;
        token.cancel();
        true
    }

    async fn answer(&self, reply: BackendReply, mode: AssistMode) -> Turn {
        self.transcript.post(&Notice::assistant(&reply.text));

        let outcome = if let Some(reason) = &reply.ignored_command {
            self.transcript.post(&Notice::warning(format!(
                "Ignored malformed command from assistant ({reason})"
            )));
            None
        } else if let Some(command) = &reply.command {
            match mode {
                AssistMode::Ask => {
                    self.transcript.post(&Notice::warning(format!(
                        "{} not executed: Ask Mode is read-only",
                        command.kind
                    )));
                    None
                }
                AssistMode::Agent => {
                    info!(kind = %command.kind, "executing assistant command");
                    let outcome = match &self.dispatcher {
                        Some(dispatcher) => dispatcher.dispatch(command).await,
                        None => Err(CommandError::NotConnected),
                    };
                    self.transcript.post(&Notice::outcome(&outcome));
                    Some(outcome)
                }
            }
        } else {
            None
        };

        Turn::Answered {
            reply: reply.text,
            outcome,
        }
    }
}
