//! # Deposit Actor
//!
//! Runs the deposit machine for one transaction. It never talks to a chain:
//! every request goes to the gateway, which forwards it to the listener.

use super::messages::{ChildMessage, GatewayMessage, ListenerCommand};
use crate::domain::DepositState;
use crate::machines::deposit::{self, DepositContext, DepositEffect, DepositEvent};
use crate::machines::Transition;
use rentx_types::{GatewayTransaction, TxHash};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle owned by the gateway. Dropping it stops the deposit.
pub(crate) struct DepositHandle {
    sender: UnboundedSender<DepositEvent>,
    task: JoinHandle<()>,
}

impl DepositHandle {
    /// Queue an event. `false` once the deposit has stopped.
    pub(crate) fn send(&self, event: DepositEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

impl Drop for DepositHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct DepositActor {
    session_id: String,
    source_tx_hash: TxHash,
    mailbox: UnboundedReceiver<DepositEvent>,
    parent: UnboundedSender<GatewayMessage>,
}

/// Start a deposit at `checkingCompletion`.
pub(crate) fn spawn_deposit(
    session_id: &str,
    deposit: GatewayTransaction,
    parent: UnboundedSender<GatewayMessage>,
) -> DepositHandle {
    let (sender, mailbox) = mpsc::unbounded_channel();
    // Receiver is alive; the send cannot fail.
    let _ = sender.send(DepositEvent::Check);

    let actor = DepositActor {
        session_id: session_id.to_string(),
        source_tx_hash: deposit.source_tx_hash.clone(),
        mailbox,
        parent,
    };
    let task = tokio::spawn(actor.run(DepositContext::new(deposit)));
    DepositHandle { sender, task }
}

impl DepositActor {
    async fn run(mut self, mut context: DepositContext) {
        let mut state = DepositState::CheckingCompletion;

        while let Some(event) = self.mailbox.recv().await {
            let name = event.name();
            let Transition {
                state: next,
                context: next_context,
                effects,
            } = deposit::transition(state, event, context);

            if next != state {
                debug!(
                    session_id = %self.session_id,
                    source_tx_hash = %self.source_tx_hash,
                    from = %state,
                    to = %next,
                    "[deposit] {}",
                    name
                );
                if next.is_error() {
                    warn!(
                        session_id = %self.session_id,
                        source_tx_hash = %self.source_tx_hash,
                        error = ?next_context.deposit.error,
                        "[deposit] Entered {}",
                        next
                    );
                }
            } else if effects.is_empty() {
                debug!(
                    source_tx_hash = %self.source_tx_hash,
                    "[deposit] Ignored {} in {}",
                    name,
                    state
                );
            }

            state = next;
            context = next_context;

            for effect in effects {
                if !self.dispatch(effect, state, &context) {
                    debug!(
                        source_tx_hash = %self.source_tx_hash,
                        "[deposit] Gateway gone, stopping"
                    );
                    return;
                }
            }

            if state.is_terminal() {
                debug!(
                    source_tx_hash = %self.source_tx_hash,
                    "[deposit] Finished in {}",
                    state
                );
                return;
            }
        }
    }

    fn dispatch(&self, effect: DepositEffect, state: DepositState, context: &DepositContext) -> bool {
        let message = match effect {
            DepositEffect::RequestRestore(tx) => ChildMessage::Forward(ListenerCommand::Restore(tx)),
            DepositEffect::RequestSettle(hash) => ChildMessage::Forward(ListenerCommand::Settle(hash)),
            DepositEffect::RequestSign(tx) => ChildMessage::Forward(ListenerCommand::Sign(tx)),
            DepositEffect::RequestMint { deposit, params } => {
                ChildMessage::Forward(ListenerCommand::Mint { deposit, params })
            }
            DepositEffect::Publish(tag) => ChildMessage::Updated {
                deposit: context.deposit.clone(),
                state,
                tag,
            },
            DepositEffect::Completed => ChildMessage::Completed(context.deposit.clone()),
        };
        self.parent.send(GatewayMessage::Child(message)).is_ok()
    }
}
