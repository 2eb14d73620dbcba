use crate::command::{CommandDescriptor, CommandKind};
use crate::config::SettlePolicy;
use crate::error::CommandError;
use crate::handlers;
use mavkit::FlightLink;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Result of one dispatched command: a human-readable confirmation or the
/// reason it did not happen.
pub type Outcome = Result<String, CommandError>;

/// Validates assistant commands and routes them to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    link: Arc<dyn FlightLink>,
    settle: SettlePolicy,
}

impl Dispatcher {
    pub fn new(link: Arc<dyn FlightLink>, settle: SettlePolicy) -> Self {
        Self { link, settle }
    }

    /// Run one command. Never panics on bad input and never returns a raw
    /// link fault; every failure comes back as a `CommandError`.
    pub async fn dispatch(&self, command: &CommandDescriptor) -> Outcome {
        let kind = self.validate(command)?;

        let span = info_span!("dispatch", %kind);
        let outcome = handlers::execute(self.link.as_ref(), &self.settle, kind, command)
            .instrument(span)
            .await;

        match &outcome {
            Ok(message) => info!(%kind, "{message}"),
            Err(CommandError::PrimitiveFault(_, cause)) => {
                warn!(%kind, "flight link fault: {cause}");
            }
            Err(err) => warn!(%kind, "{err}"),
        }
        outcome
    }

    /// Preconditions, in order. A failure here has touched nothing but
    /// `is_connected`.
    fn validate(&self, command: &CommandDescriptor) -> Result<CommandKind, CommandError> {
        if !self.link.is_connected() {
            return Err(CommandError::NotConnected);
        }
        if command.kind.trim().is_empty() {
            return Err(CommandError::InvalidCommand);
        }
        let kind = CommandKind::from_token(&command.kind)
            .ok_or_else(|| CommandError::UnknownCommandKind(command.kind.clone()))?;

        if let Some(missing) = kind
            .required_params()
            .iter()
            .copied()
            .find(|name| command.param(name).is_none())
        {
            return Err(CommandError::MissingParameter(kind, missing));
        }
        Ok(kind)
    }
}
