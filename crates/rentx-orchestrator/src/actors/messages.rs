//! Mailbox messages between orchestrator tasks.

use crate::domain::{DepositState, GatewayCreation};
use crate::machines::burn::BurnEvent;
use crate::machines::deposit::DepositEvent;
use crate::ports::{BurnCommand, GatewayCommand};
use rentx_bus::EventTag;
use rentx_types::{CustomParams, GatewayTransaction, SessionError, TxHash};

/// Gateway mailbox.
#[derive(Debug)]
pub(crate) enum GatewayMessage {
    Command(GatewayCommand),
    /// Result of the creation task.
    Created(Result<GatewayCreation, SessionError>),
    Child(ChildMessage),
    Listener(ListenerEvent),
}

/// Deposit child to gateway.
#[derive(Debug)]
pub(crate) enum ChildMessage {
    /// Pass through to the listener unchanged.
    Forward(ListenerCommand),
    Updated {
        deposit: GatewayTransaction,
        state: DepositState,
        tag: EventTag,
    },
    Completed(GatewayTransaction),
}

/// Work only the listener performs.
#[derive(Debug)]
pub(crate) enum ListenerCommand {
    Restore(GatewayTransaction),
    Settle(TxHash),
    Sign(GatewayTransaction),
    Mint {
        deposit: GatewayTransaction,
        params: CustomParams,
    },
}

impl ListenerCommand {
    pub(crate) fn source_tx_hash(&self) -> &str {
        match self {
            Self::Restore(tx) | Self::Sign(tx) => &tx.source_tx_hash,
            Self::Mint { deposit, .. } => &deposit.source_tx_hash,
            Self::Settle(hash) => hash,
        }
    }
}

/// Listener to gateway.
#[derive(Debug)]
pub(crate) enum ListenerEvent {
    Detected(GatewayTransaction),
    /// Deliver to the child owning `source_tx_hash`.
    Routed {
        source_tx_hash: TxHash,
        event: DepositEvent,
    },
    Failed(SessionError),
}

/// Burn mailbox.
#[derive(Debug)]
pub(crate) enum BurnMessage {
    Command(BurnCommand),
    Event(BurnEvent),
}
