//! # Burn Orchestrator
//!
//! Drives one burn session: compute the amount, broadcast the burn on the
//! source chain, wait for confirmations, then ask RenVM to release on the
//! destination chain.
//!
//! A restored session with a transaction never burns again; it resumes
//! monitoring or releasing from the recorded hash.

use super::messages::BurnMessage;
use super::operations::{drive_with_progress, watch_confirmations, ConfirmationUpdate, OperationSet};
use crate::algorithms::create_burn;
use crate::config::OrchestratorConfig;
use crate::domain::{BurnState, OrchestratorError};
use crate::machines::burn::{self, BurnContext, BurnEffect, BurnEvent};
use crate::machines::Transition;
use crate::ports::{
    BurnCommand, BurnProgress, BurnRequest, BurnSessionApi, DestinationChain, ReleaseProgress,
    ReleaseRequest, SourceChain,
};
use crate::registry::ChainRegistry;
use rentx_bus::{EventTag, SessionEvent, SessionPublisher};
use rentx_types::{now_millis, BurnSession, BurnTransaction, ErrorKind};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configured, not yet running, burn session.
pub struct BurnOrchestrator {
    session: BurnSession,
    source: Arc<dyn SourceChain>,
    dest: Arc<dyn DestinationChain>,
    publisher: Arc<dyn SessionPublisher>,
    config: OrchestratorConfig,
}

impl BurnOrchestrator {
    pub fn new(
        session: BurnSession,
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

    /// Resolve the burning chain and the releasing chain by name.
    pub fn from_registry(
        session: BurnSession,
        registry: &ChainRegistry,
        publisher: Arc<dyn SessionPublisher>,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        let source = registry.source(&session.params.source_chain)?;
        let dest = registry.destination(&session.params.dest_chain)?;
        Self::new(session, source, dest, publisher, config)
    }

    pub fn spawn(self) -> BurnHandle {
        let session_id = self.session.id.clone();
        let (sender, mailbox) = mpsc::unbounded_channel();

        info!(
            session_id = %session_id,
            source = %self.source.name(),
            dest = %self.dest.name(),
            restored = self.session.transaction.is_some(),
            "[burn] Starting burn session"
        );

        let actor = BurnActor {
            source: self.source,
            dest: self.dest,
            publisher: self.publisher,
            config: self.config,
            mailbox,
            self_sender: sender.clone(),
            operations: OperationSet::new(),
        };
        let task = tokio::spawn(actor.run(self.session));

        BurnHandle {
            session_id,
            sender,
            task,
        }
    }
}

/// Final state of a burn run.
#[derive(Debug, Clone)]
pub struct BurnOutcome {
    pub state: BurnState,
    pub session: BurnSession,
}

/// Caller side of a running burn session. Dropping it detaches.
pub struct BurnHandle {
    session_id: String,
    sender: UnboundedSender<BurnMessage>,
    task: JoinHandle<BurnOutcome>,
}

impl BurnHandle {
    fn command(&self, command: BurnCommand) -> Result<(), OrchestratorError> {
        self.sender
            .send(BurnMessage::Command(command))
            .map_err(|_| OrchestratorError::ActorStopped(self.session_id.clone()))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the release or a stop.
    pub async fn join(self) -> Result<BurnOutcome, OrchestratorError> {
        self.task
            .await
            .map_err(|_| OrchestratorError::ActorPanicked(self.session_id))
    }
}

impl BurnSessionApi for BurnHandle {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn submit(&self) -> Result<(), OrchestratorError> {
        self.command(BurnCommand::Submit)
    }

    fn retry(&self) -> Result<(), OrchestratorError> {
        self.command(BurnCommand::Retry)
    }

    fn stop(&self) -> Result<(), OrchestratorError> {
        self.command(BurnCommand::Stop)
    }
}

struct BurnActor {
    source: Arc<dyn SourceChain>,
    dest: Arc<dyn DestinationChain>,
    publisher: Arc<dyn SessionPublisher>,
    config: OrchestratorConfig,
    mailbox: UnboundedReceiver<BurnMessage>,
    self_sender: UnboundedSender<BurnMessage>,
    operations: OperationSet,
}

impl BurnActor {
    async fn run(mut self, session: BurnSession) -> BurnOutcome {
        let mut state = BurnState::Restoring;
        let mut context = BurnContext::new(session, self.config.burn_policy());
        (state, context) = self.apply(state, context, BurnEvent::Restore).await;

        while !state.is_terminal() {
            let event = match self.mailbox.recv().await {
                Some(BurnMessage::Command(BurnCommand::Stop)) => {
                    info!(session_id = %context.session.id, "[burn] Stopped by caller");
                    self.publish(EventTag::Stopped, state, &context).await;
                    break;
                }
                Some(BurnMessage::Command(BurnCommand::Submit)) => BurnEvent::Submit,
                Some(BurnMessage::Command(BurnCommand::Retry)) => BurnEvent::Retry,
                Some(BurnMessage::Event(event)) => event,
                None => break,
            };
            (state, context) = self.apply(state, context, event).await;
        }

        debug!(
            session_id = %context.session.id,
            operations = self.operations.active(),
            "[burn] Shutting down"
        );
        self.operations.abort_all();
        BurnOutcome {
            state,
            session: context.session,
        }
    }

    async fn apply(
        &mut self,
        state: BurnState,
        context: BurnContext,
        event: BurnEvent,
    ) -> (BurnState, BurnContext) {
        let name = event.name();
        let Transition {
            state: next,
            context,
            effects,
        } = burn::transition(state, event, context);

        if next != state {
            info!(
                session_id = %context.session.id,
                from = %state,
                to = %next,
                "[burn] {}",
                name
            );
            if matches!(
                next,
                BurnState::CreateError | BurnState::ErrorBurning | BurnState::ErrorReleasing
            ) {
                warn!(
                    session_id = %context.session.id,
                    error = ?context.session.error,
                    "[burn] Entered {}",
                    next
                );
            }
        } else if effects.is_empty() {
            debug!(session_id = %context.session.id, "[burn] Ignored {} in {}", name, state);
        }

        for effect in effects {
            self.execute(effect, next, &context).await;
        }
        (next, context)
    }

    async fn execute(&mut self, effect: BurnEffect, state: BurnState, context: &BurnContext) {
        match effect {
            BurnEffect::CreateBurn => self.create(&context.session),
            BurnEffect::SubmitBurn => self.submit(&context.session),
            BurnEffect::WatchConfirmations(hash) => self.watch(hash),
            BurnEffect::RequestRelease(tx) => self.release(&context.session, tx),
            BurnEffect::Emit(tag) => self.publish(tag, state, context).await,
        }
    }

    fn create(&mut self, session: &BurnSession) {
        let session = session.clone();
        let source = Arc::clone(&self.source);
        let dest = Arc::clone(&self.dest);
        let auto_fees = self.config.auto_fees;
        let mailbox = self.self_sender.clone();
        self.operations.spawn("create", async move {
            let event = match create_burn(&session, source.as_ref(), dest.as_ref(), auto_fees).await {
                Ok(suggested_amount) => BurnEvent::Created { suggested_amount },
                Err(error) => BurnEvent::CreateFailed(error),
            };
            let _ = mailbox.send(BurnMessage::Event(event));
        });
    }

    fn submit(&mut self, session: &BurnSession) {
        let request = BurnRequest::for_session(session, session.suggested_amount.unwrap_or_default());
        let source = Arc::clone(&self.source);
        let mailbox = self.self_sender.clone();
        self.operations.spawn("submit", async move {
            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let result = drive_with_progress(
                source.submit_burn(&request, progress_tx),
                progress_rx,
                |progress| {
                    let event = match progress {
                        BurnProgress::Submitted { tx_hash } => BurnEvent::Submitted {
                            source_tx_hash: tx_hash,
                            now_ms: now_millis(),
                        },
                        BurnProgress::Confirmation { current, target } => BurnEvent::Confirmation {
                            current,
                            target: Some(target),
                        },
                    };
                    let _ = mailbox.send(BurnMessage::Event(event));
                },
            )
            .await;
            let event = match result {
                Ok(source_tx_hash) => BurnEvent::Submitted {
                    source_tx_hash,
                    now_ms: now_millis(),
                },
                Err(e) => BurnEvent::SubmitFailed(e.into_session_error(ErrorKind::Submission)),
            };
            let _ = mailbox.send(BurnMessage::Event(event));
        });
    }

    fn watch(&mut self, hash: String) {
        let mailbox = self.self_sender.clone();
        let monitor = watch_confirmations(
            Arc::clone(&self.source),
            hash.clone(),
            self.config.confirmation_poll_interval,
            move |update| {
                let event = match update {
                    ConfirmationUpdate::Progress(status) => BurnEvent::Confirmation {
                        current: status.current,
                        target: Some(status.target),
                    },
                    ConfirmationUpdate::Reached(status) => BurnEvent::Confirmed {
                        current: status.current,
                        target: status.target,
                    },
                    ConfirmationUpdate::Failed(e) => {
                        BurnEvent::ConfirmationFailed(e.into_session_error(ErrorKind::Confirmation))
                    }
                };
                mailbox.send(BurnMessage::Event(event)).is_ok()
            },
        );
        self.operations.spawn(format!("confirm:{hash}"), monitor);
    }

    fn release(&mut self, session: &BurnSession, tx: BurnTransaction) {
        let request = ReleaseRequest {
            session_id: session.id.clone(),
            network: session.params.network,
            asset: session.params.source_asset.clone(),
            dest_address: session.params.dest_address.clone(),
            source_tx_hash: tx.source_tx_hash,
            amount: tx.source_tx_amount,
            custom_params: session.custom_params.clone(),
        };
        let dest = Arc::clone(&self.dest);
        let mailbox = self.self_sender.clone();
        self.operations.spawn("release", async move {
            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let result = drive_with_progress(
                dest.request_release(&request, progress_tx),
                progress_rx,
                |progress| {
                    let event = match progress {
                        ReleaseProgress::Accepted { ren_vm_hash } => {
                            BurnEvent::Accepted { ren_vm_hash }
                        }
                        ReleaseProgress::Transaction { dest_tx_hash } => {
                            BurnEvent::DestTransaction { dest_tx_hash }
                        }
                    };
                    let _ = mailbox.send(BurnMessage::Event(event));
                },
            )
            .await;
            let event = match result {
                Ok(response) => BurnEvent::Released {
                    response,
                    now_ms: now_millis(),
                },
                Err(e) => BurnEvent::ReleaseFailed(e.into_session_error(ErrorKind::Release)),
            };
            let _ = mailbox.send(BurnMessage::Event(event));
        });
    }

    async fn publish(&self, tag: EventTag, state: BurnState, context: &BurnContext) {
        let event = SessionEvent::burn(tag, state.as_str(), &context.session);
        let receivers = self.publisher.publish(event).await;
        debug!(session_id = %context.session.id, ?tag, receivers, "[burn] Published");
    }
}
