//! # Deposit Listener
//!
//! The single task per gateway that talks to the chains for a mint. It owns
//! the deposit watch and every signing, confirmation and claim operation,
//! and reports back to the gateway, which routes results to deposits by
//! source transaction hash.

use super::messages::{GatewayMessage, ListenerCommand, ListenerEvent};
use super::operations::{drive_with_progress, watch_confirmations, ConfirmationUpdate, OperationSet};
use crate::algorithms::verify_gateway_address;
use crate::domain::RenSignature;
use crate::machines::deposit::DepositEvent;
use crate::ports::{
    ClaimProgress, ClaimRequest, DestinationChain, SignatureOutcome, SignatureRequest, SourceChain,
};
use rentx_types::{
    now_millis, CustomParams, ErrorKind, GatewaySession, GatewayTransaction, RawDeposit,
    SessionError, TxHash,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle owned by the gateway. Dropping it stops the listener and all of
/// its operations.
pub(crate) struct ListenerHandle {
    commands: UnboundedSender<ListenerCommand>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn send(&self, command: ListenerCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) struct DepositListener {
    session: GatewaySession,
    source: Arc<dyn SourceChain>,
    dest: Arc<dyn DestinationChain>,
    parent: UnboundedSender<GatewayMessage>,
    /// Deposits already reported or restored.
    known: HashSet<TxHash>,
    operations: OperationSet,
    poll_interval: Duration,
}

impl DepositListener {
    pub(crate) fn new(
        session: GatewaySession,
        source: Arc<dyn SourceChain>,
        dest: Arc<dyn DestinationChain>,
        parent: UnboundedSender<GatewayMessage>,
        poll_interval: Duration,
    ) -> Self {
        let known = session.transactions.keys().cloned().collect();
        Self {
            session,
            source,
            dest,
            parent,
            known,
            operations: OperationSet::new(),
            poll_interval,
        }
    }

    pub(crate) fn spawn(self) -> ListenerHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(receiver));
        ListenerHandle { commands, task }
    }

    async fn run(mut self, mut commands: UnboundedReceiver<ListenerCommand>) {
        let address = match verify_gateway_address(&self.session, self.source.as_ref()).await {
            Ok(address) => address,
            Err(error) => {
                warn!(session_id = %self.session.id, %error, "[listener] Gateway check failed");
                let _ = self
                    .parent
                    .send(GatewayMessage::Listener(ListenerEvent::Failed(error)));
                return;
            }
        };

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let source = Arc::clone(&self.source);
        let parent = self.parent.clone();
        let watched = address.clone();
        self.operations.spawn("watch", async move {
            if let Err(e) = source.watch_deposits(&watched, raw_tx).await {
                let error = e.into_session_error(ErrorKind::Listening);
                let _ = parent.send(GatewayMessage::Listener(ListenerEvent::Failed(error)));
            }
        });
        info!(
            session_id = %self.session.id,
            address = %address,
            known = self.known.len(),
            "[listener] Watching gateway address"
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(raw) = raw_rx.recv() => self.detect(raw),
            }
        }
        debug!(session_id = %self.session.id, "[listener] Stopped");
    }

    fn detect(&mut self, raw: RawDeposit) {
        let hash = match self.source.transaction_id(&raw) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(session_id = %self.session.id, error = %e, "[listener] Unreadable deposit");
                return;
            }
        };
        if !self.known.insert(hash.clone()) {
            debug!(source_tx_hash = %hash, "[listener] Already tracking deposit");
            return;
        }
        info!(
            session_id = %self.session.id,
            source_tx_hash = %hash,
            amount = raw.amount,
            "[listener] Deposit detected"
        );
        let deposit = GatewayTransaction::detected(hash, raw, now_millis());
        let _ = self
            .parent
            .send(GatewayMessage::Listener(ListenerEvent::Detected(deposit)));
    }

    fn handle(&mut self, command: ListenerCommand) {
        debug!(source_tx_hash = %command.source_tx_hash(), "[listener] {:?}", CommandName(&command));
        match command {
            ListenerCommand::Restore(tx) => self.restore(tx),
            ListenerCommand::Settle(hash) => self.settle(hash),
            ListenerCommand::Sign(tx) => self.sign(tx),
            ListenerCommand::Mint { deposit, params } => self.mint(deposit, params),
        }
    }

    /// Re-attach a persisted deposit. The payload must still identify it.
    fn restore(&mut self, tx: GatewayTransaction) {
        self.known.insert(tx.source_tx_hash.clone());
        let event = match &tx.raw_source_tx {
            None => DepositEvent::RestoreFailed(SessionError::new(
                ErrorKind::Restore,
                "no source transaction payload",
            )),
            Some(raw) => match self.source.transaction_id(raw) {
                Ok(hash) if hash == tx.source_tx_hash => DepositEvent::Restored(tx.clone()),
                Ok(hash) => DepositEvent::RestoreFailed(SessionError::new(
                    ErrorKind::Restore,
                    format!("payload identifies {hash}"),
                )),
                Err(e) => DepositEvent::RestoreFailed(e.into_session_error(ErrorKind::Restore)),
            },
        };
        route(&self.parent, &tx.source_tx_hash, event);
    }

    fn settle(&mut self, hash: TxHash) {
        let parent = self.parent.clone();
        let target = hash.clone();
        let monitor = watch_confirmations(
            Arc::clone(&self.source),
            hash.clone(),
            self.poll_interval,
            move |update| {
                let event = match update {
                    ConfirmationUpdate::Progress(status) => DepositEvent::Confirmation {
                        current: status.current,
                        target: Some(status.target),
                    },
                    ConfirmationUpdate::Reached(status) => DepositEvent::Confirmed {
                        current: status.current,
                        target: status.target,
                    },
                    ConfirmationUpdate::Failed(e) => {
                        DepositEvent::ConfirmationFailed(e.into_session_error(ErrorKind::Confirmation))
                    }
                };
                route(&parent, &target, event)
            },
        );
        self.operations.spawn(format!("settle:{hash}"), monitor);
    }

    fn sign(&mut self, tx: GatewayTransaction) {
        let hash = tx.source_tx_hash.clone();
        let Some(raw) = tx.raw_source_tx else {
            let error = SessionError::new(ErrorKind::SigningTransient, "no source transaction payload");
            route(&self.parent, &hash, DepositEvent::SignFailed(error));
            return;
        };
        let request = SignatureRequest {
            session_id: self.session.id.clone(),
            asset: self.session.params.source_asset.clone(),
            nonce: self.session.nonce.clone().unwrap_or_default(),
            dest_address: self.session.params.dest_address.clone(),
            source_tx_hash: hash.clone(),
            raw,
        };
        let dest = Arc::clone(&self.dest);
        let parent = self.parent.clone();
        let key = format!("sign:{hash}");
        self.operations.spawn(key, async move {
            let event = match dest.request_signature(&request).await {
                Ok(SignatureOutcome::Signed {
                    ren_vm_hash,
                    signature,
                    response,
                }) => DepositEvent::Signed(RenSignature {
                    ren_vm_hash,
                    signature,
                    response,
                }),
                Ok(SignatureOutcome::Reverted { reason }) => {
                    DepositEvent::Reverted(SessionError::new(ErrorKind::SigningReverted, reason))
                }
                Err(e) => DepositEvent::SignFailed(e.into_session_error(ErrorKind::SigningTransient)),
            };
            route(&parent, &hash, event);
        });
    }

    fn mint(&mut self, deposit: GatewayTransaction, params: CustomParams) {
        let hash = deposit.source_tx_hash.clone();
        let request = ClaimRequest {
            session_id: self.session.id.clone(),
            dest_chain: self.session.params.dest_chain.clone(),
            dest_address: self.session.params.dest_address.clone(),
            deposit,
            contract_params: params,
        };
        let dest = Arc::clone(&self.dest);
        let parent = self.parent.clone();
        let key = format!("mint:{hash}");
        self.operations.spawn(key, async move {
            let (progress_tx, progress_rx) = mpsc::unbounded_channel();
            let result = drive_with_progress(
                dest.submit_claim(&request, progress_tx),
                progress_rx,
                |progress| {
                    let event = match progress {
                        ClaimProgress::Submitted { dest_tx_hash } => {
                            DepositEvent::Submitted { dest_tx_hash }
                        }
                        ClaimProgress::Confirmed => DepositEvent::DestConfirmed,
                    };
                    route(&parent, &hash, event);
                },
            )
            .await;
            let event = match result {
                // Ignored by the deposit if progress already delivered it.
                Ok(dest_tx_hash) => DepositEvent::Submitted { dest_tx_hash },
                Err(e) => DepositEvent::SubmitFailed(e.into_session_error(ErrorKind::Claim)),
            };
            route(&parent, &hash, event);
        });
    }
}

/// Send `event` to the deposit `source_tx_hash` through the gateway.
fn route(parent: &UnboundedSender<GatewayMessage>, source_tx_hash: &str, event: DepositEvent) -> bool {
    parent
        .send(GatewayMessage::Listener(ListenerEvent::Routed {
            source_tx_hash: source_tx_hash.to_string(),
            event,
        }))
        .is_ok()
}

/// Logs a command without its payload.
struct CommandName<'a>(&'a ListenerCommand);

impl std::fmt::Debug for CommandName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            ListenerCommand::Restore(_) => "RESTORE",
            ListenerCommand::Settle(_) => "SETTLE",
            ListenerCommand::Sign(_) => "SIGN",
            ListenerCommand::Mint { .. } => "MINT",
        })
    }
}
