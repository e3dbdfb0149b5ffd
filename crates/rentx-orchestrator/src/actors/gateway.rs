//! # Gateway Orchestrator
//!
//! Root actor of a mint session. Owns the canonical `GatewaySession`, the
//! deposit listener and one deposit child per transaction.
//!
//! ## Message flow
//!
//! ```text
//! caller ──command──→ gateway ──event──→ deposit child
//!                        ↑  ↓                 │
//!             Detected/  │  │ Forward         │ Updated/Completed
//!               Routed   │  ↓                 ↓
//!                      listener ←────────── gateway
//! ```
//!
//! Every transition that changes the session publishes a `SessionEvent`
//! carrying a full snapshot, so callers can persist and later restore it.

use super::deposit::{spawn_deposit, DepositHandle};
use super::listener::{DepositListener, ListenerHandle};
use super::messages::{ChildMessage, GatewayMessage, ListenerEvent};
use super::operations::OperationSet;
use crate::algorithms::create_gateway;
use crate::config::OrchestratorConfig;
use crate::domain::{GatewayState, OrchestratorError};
use crate::machines::deposit::DepositEvent;
use crate::machines::gateway::{self, GatewayContext, GatewayEffect, GatewayEvent};
use crate::machines::Transition;
use crate::ports::{DestinationChain, GatewayCommand, MintSessionApi, SourceChain};
use crate::registry::ChainRegistry;
use rentx_bus::{EventTag, SessionEvent, SessionPublisher};
use rentx_types::{now_millis, CustomParams, GatewaySession, TxHash};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configured, not yet running, mint session.
pub struct GatewayOrchestrator {
    session: GatewaySession,
    source: Arc<dyn SourceChain>,
    dest: Arc<dyn DestinationChain>,
    publisher: Arc<dyn SessionPublisher>,
    config: OrchestratorConfig,
}

impl GatewayOrchestrator {
    pub fn new(
        session: GatewaySession,
        source: Arc<dyn SourceChain>,
        dest: Arc<dyn DestinationChain>,
        publisher: Arc<dyn SessionPublisher>,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            session,
            source,
            dest,
            publisher,
            config,
        })
    }

    /// Resolve both chains by the names in the session parameters.
    pub fn from_registry(
        session: GatewaySession,
        registry: &ChainRegistry,
        publisher: Arc<dyn SessionPublisher>,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        let source = registry.source(&session.params.source_chain)?;
        let dest = registry.destination(&session.params.dest_chain)?;
        Self::new(session, source, dest, publisher, config)
    }

    /// Start the session. A snapshot from an earlier run resumes where it
    /// left off; a fresh one creates its gateway address first.
    pub fn spawn(self) -> GatewayHandle {
        let session_id = self.session.id.clone();
        let (sender, mailbox) = mpsc::unbounded_channel();

        info!(
            session_id = %session_id,
            source = %self.source.name(),
            dest = %self.dest.name(),
            deposits = self.session.transactions.len(),
            "[gateway] Starting mint session"
        );

        let actor = GatewayActor {
            source: self.source,
            dest: self.dest,
            publisher: self.publisher,
            config: self.config,
            mailbox,
            self_sender: sender.clone(),
            children: HashMap::new(),
            listener: None,
            operations: OperationSet::new(),
        };
        let task = tokio::spawn(actor.run(self.session));

        GatewayHandle {
            session_id,
            sender,
            task,
        }
    }
}

/// Final state of a gateway run.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    pub state: GatewayState,
    /// Last snapshot. Feed it back to `GatewayOrchestrator::new` to resume.
    pub session: GatewaySession,
}

/// Caller side of a running mint session.
///
/// Dropping the handle detaches; the session keeps running until it expires
/// or is stopped.
pub struct GatewayHandle {
    session_id: String,
    sender: UnboundedSender<GatewayMessage>,
    task: JoinHandle<GatewayOutcome>,
}

impl GatewayHandle {
    fn command(&self, command: GatewayCommand) -> Result<(), OrchestratorError> {
        self.sender
            .send(GatewayMessage::Command(command))
            .map_err(|_| OrchestratorError::ActorStopped(self.session_id.clone()))
    }

    /// Whether the orchestrator task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to finish.
    pub async fn join(self) -> Result<GatewayOutcome, OrchestratorError> {
        self.task
            .await
            .map_err(|_| OrchestratorError::ActorPanicked(self.session_id))
    }
}

impl MintSessionApi for GatewayHandle {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn claim(&self, source_tx_hash: &str, params: CustomParams) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::Claim {
            source_tx_hash: source_tx_hash.to_string(),
            params,
        })
    }

    fn acknowledge(&self, source_tx_hash: &str) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::Acknowledge {
            source_tx_hash: source_tx_hash.to_string(),
        })
    }

    fn reject(&self, source_tx_hash: &str) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::Reject {
            source_tx_hash: source_tx_hash.to_string(),
        })
    }

    fn retry_deposit(&self, source_tx_hash: &str) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::RetryDeposit {
            source_tx_hash: source_tx_hash.to_string(),
        })
    }

    fn retry(&self) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::Retry)
    }

    fn stop(&self) -> Result<(), OrchestratorError> {
        self.command(GatewayCommand::Stop)
    }
}

struct GatewayActor {
    source: Arc<dyn SourceChain>,
    dest: Arc<dyn DestinationChain>,
    publisher: Arc<dyn SessionPublisher>,
    config: OrchestratorConfig,
    mailbox: UnboundedReceiver<GatewayMessage>,
    /// Handed to children, the listener and operations.
    self_sender: UnboundedSender<GatewayMessage>,
    children: HashMap<TxHash, DepositHandle>,
    listener: Option<ListenerHandle>,
    operations: OperationSet,
}

impl GatewayActor {
    async fn run(mut self, session: GatewaySession) -> GatewayOutcome {
        let now_ms = now_millis();
        let expiry = tokio::time::sleep(Duration::from_millis(session.remaining_ms(now_ms)));
        tokio::pin!(expiry);

        let mut state = GatewayState::Restoring;
        let mut context = GatewayContext::new(session, self.config.gateway_policy());
        (state, context) = self
            .apply(state, context, GatewayEvent::Restore { now_ms })
            .await;

        while !state.is_terminal() {
            tokio::select! {
                () = &mut expiry => {
                    (state, context) = self.apply(state, context, GatewayEvent::Expired).await;
                }
                message = self.mailbox.recv() => match message {
                    Some(GatewayMessage::Command(GatewayCommand::Stop)) => {
                        info!(session_id = %context.session.id, "[gateway] Stopped by caller");
                        self.publish(EventTag::Stopped, state, &context, None).await;
                        break;
                    }
                    Some(message) => {
                        (state, context) = self.handle(state, context, message).await;
                    }
                    None => break,
                },
            }
        }

        self.shutdown(&context.session.id);
        GatewayOutcome {
            state,
            session: context.session,
        }
    }

    async fn handle(
        &mut self,
        state: GatewayState,
        context: GatewayContext,
        message: GatewayMessage,
    ) -> (GatewayState, GatewayContext) {
        let event = match message {
            GatewayMessage::Command(command) => match command {
                GatewayCommand::Claim {
                    source_tx_hash,
                    params,
                } => {
                    self.to_child(&source_tx_hash, DepositEvent::Claim(params));
                    return (state, context);
                }
                GatewayCommand::Acknowledge { source_tx_hash } => {
                    let now_ms = now_millis();
                    self.to_child(&source_tx_hash, DepositEvent::Acknowledge { now_ms });
                    return (state, context);
                }
                GatewayCommand::Reject { source_tx_hash } => {
                    self.to_child(&source_tx_hash, DepositEvent::Reject);
                    return (state, context);
                }
                GatewayCommand::RetryDeposit { source_tx_hash } => {
                    self.to_child(&source_tx_hash, DepositEvent::Retry);
                    return (state, context);
                }
                GatewayCommand::Retry => GatewayEvent::Retry {
                    now_ms: now_millis(),
                },
                // Handled by the run loop.
                GatewayCommand::Stop => return (state, context),
            },
            GatewayMessage::Created(Ok(creation)) => GatewayEvent::Created(creation),
            GatewayMessage::Created(Err(error)) => GatewayEvent::CreateFailed(error),
            GatewayMessage::Child(ChildMessage::Forward(command)) => {
                let delivered = self.listener.as_ref().is_some_and(|l| l.send(command));
                if !delivered {
                    debug!(session_id = %context.session.id, "[gateway] No listener, request dropped");
                }
                return (state, context);
            }
            GatewayMessage::Child(ChildMessage::Updated {
                deposit,
                state: deposit_state,
                tag,
            }) => GatewayEvent::DepositUpdated {
                deposit,
                state: deposit_state,
                tag,
            },
            GatewayMessage::Child(ChildMessage::Completed(deposit)) => {
                GatewayEvent::DepositCompleted(deposit)
            }
            GatewayMessage::Listener(ListenerEvent::Detected(deposit)) => {
                GatewayEvent::Deposit(deposit)
            }
            GatewayMessage::Listener(ListenerEvent::Routed {
                source_tx_hash,
                event,
            }) => {
                self.to_child(&source_tx_hash, event);
                return (state, context);
            }
            GatewayMessage::Listener(ListenerEvent::Failed(error)) => {
                GatewayEvent::ListenerFailed(error)
            }
        };
        self.apply(state, context, event).await
    }

    /// Run one machine transition and execute its effects.
    async fn apply(
        &mut self,
        state: GatewayState,
        context: GatewayContext,
        event: GatewayEvent,
    ) -> (GatewayState, GatewayContext) {
        let name = event.name();
        let Transition {
            state: next,
            context,
            effects,
        } = gateway::transition(state, event, context);

        if next != state {
            info!(
                session_id = %context.session.id,
                from = %state,
                to = %next,
                "[gateway] {}",
                name
            );
            if next == GatewayState::SrcInitializeError {
                warn!(
                    session_id = %context.session.id,
                    error = ?context.session.error,
                    "[gateway] Initialization failed"
                );
            }
        } else if effects.is_empty() {
            debug!(session_id = %context.session.id, "[gateway] Ignored {} in {}", name, state);
        }

        for effect in effects {
            self.execute(effect, next, &context).await;
        }
        (next, context)
    }

    async fn execute(&mut self, effect: GatewayEffect, state: GatewayState, context: &GatewayContext) {
        match effect {
            GatewayEffect::CreateGateway => {
                let session = context.session.clone();
                let source = Arc::clone(&self.source);
                let dest = Arc::clone(&self.dest);
                let auto_fees = self.config.auto_fees;
                let mailbox = self.self_sender.clone();
                self.operations.spawn("create", async move {
                    let result =
                        create_gateway(&session, source.as_ref(), dest.as_ref(), auto_fees).await;
                    let _ = mailbox.send(GatewayMessage::Created(result));
                });
            }
            GatewayEffect::SpawnDeposit(deposit) => {
                let hash = deposit.source_tx_hash.clone();
                let child = spawn_deposit(&context.session.id, deposit, self.self_sender.clone());
                self.children.insert(hash, child);
            }
            GatewayEffect::StartListener => {
                let listener = DepositListener::new(
                    context.session.clone(),
                    Arc::clone(&self.source),
                    Arc::clone(&self.dest),
                    self.self_sender.clone(),
                    self.config.confirmation_poll_interval,
                );
                self.listener = Some(listener.spawn());
            }
            GatewayEffect::StopDeposit(hash) => {
                self.children.remove(&hash);
            }
            GatewayEffect::StopAll => {
                self.listener = None;
                self.children.clear();
            }
            GatewayEffect::ClaimDeposit(hash) => {
                self.to_child(&hash, DepositEvent::Claim(CustomParams::new()));
            }
            GatewayEffect::AcknowledgeDeposit(hash) => {
                let now_ms = now_millis();
                self.to_child(&hash, DepositEvent::Acknowledge { now_ms });
            }
            GatewayEffect::Emit {
                tag,
                source_tx_hash,
            } => {
                self.publish(tag, state, context, source_tx_hash).await;
            }
        }
    }

    async fn publish(
        &self,
        tag: EventTag,
        state: GatewayState,
        context: &GatewayContext,
        source_tx_hash: Option<TxHash>,
    ) {
        let mut event = SessionEvent::gateway(tag, state.as_str(), &context.session);
        if let Some(hash) = source_tx_hash {
            let deposit_state = context
                .deposit_state(&hash)
                .map(|s| s.as_str().to_string());
            event = event.for_deposit(hash, deposit_state);
        }
        let receivers = self.publisher.publish(event).await;
        debug!(session_id = %context.session.id, ?tag, receivers, "[gateway] Published");
    }

    fn to_child(&self, source_tx_hash: &str, event: DepositEvent) {
        let name = event.name();
        let delivered = self
            .children
            .get(source_tx_hash)
            .is_some_and(|child| child.send(event));
        if !delivered {
            debug!(
                source_tx_hash = %source_tx_hash,
                "[gateway] No live deposit for {}",
                name
            );
        }
    }

    fn shutdown(&mut self, session_id: &str) {
        debug!(
            session_id = %session_id,
            deposits = self.children.len(),
            operations = self.operations.active(),
            "[gateway] Shutting down"
        );
        self.listener = None;
        self.children.clear();
        self.operations.abort_all();
    }
}
