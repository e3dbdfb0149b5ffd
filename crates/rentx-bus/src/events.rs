//! # Session Events
//!
//! The caller-facing event: tag, orchestrator state and a full snapshot.

use rentx_types::{BurnSession, BurnTransaction, GatewaySession, GatewayTransaction, TxHash};
use serde::{Deserialize, Serialize};

/// What happened on a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    // =========================================================================
    // GATEWAY
    // =========================================================================
    /// Session loaded and restore decided.
    Restored,
    /// Gateway address derivation started.
    Creating,
    /// Nonce and gateway address computed.
    GatewayCreated,
    /// Creation or listening failed.
    InitializeError,
    /// Watching the gateway address for deposits.
    Listening,
    /// Session expired; listener and deposits stopped.
    Expired,
    /// Cancelled by the caller.
    Stopped,

    // =========================================================================
    // DEPOSIT
    // =========================================================================
    /// A new deposit was detected.
    Deposit,
    /// A persisted deposit resumed.
    DepositRestored,
    /// A persisted deposit could not be restored.
    RestoreError,
    /// Confirmations increased.
    Confirmation,
    /// Confirmation target reached.
    Confirmed,
    /// The confirmation monitor failed.
    ConfirmationError,
    /// Signed by RenVM and ready to claim.
    Claimable,
    /// Signing failed transiently.
    SignError,
    /// RenVM reverted the deposit.
    Reverted,
    /// Claim submission started.
    Claiming,
    /// Claim broadcast on the destination chain.
    Submitted,
    /// Claim submission failed.
    SubmitError,
    /// Claim confirmed on the destination chain.
    DestConfirmed,
    /// Acknowledged by the caller.
    DepositCompleted,
    /// Rejected by the caller.
    Rejected,

    // =========================================================================
    // BURN
    // =========================================================================
    /// Burn amount computed.
    BurnCreated,
    /// Burn amount computation failed.
    CreateError,
    /// Burn broadcast on the source chain.
    BurnSubmitted,
    /// Burn submission or monitoring failed.
    BurnError,
    /// RenVM accepted the release.
    Accepted,
    /// Funds released on the destination chain.
    Released,
    /// Release failed.
    ReleaseError,
}

impl EventTag {
    /// Tags emitted when an error was recorded on the snapshot.
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::InitializeError
                | Self::RestoreError
                | Self::ConfirmationError
                | Self::SignError
                | Self::Reverted
                | Self::SubmitError
                | Self::CreateError
                | Self::BurnError
                | Self::ReleaseError
        )
    }
}

/// Read-only copy of the session that emitted an event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "session", rename_all = "camelCase")]
pub enum SessionSnapshot {
    /// Mint session.
    Gateway(GatewaySession),
    /// Burn session.
    Burn(BurnSession),
}

/// Event published on every orchestrator transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub tag: EventTag,
    pub session_id: String,
    /// Gateway or burn orchestrator state after the transition.
    pub state: String,
    /// Set for deposit-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_tx_hash: Option<TxHash>,
    /// Deposit orchestrator state, for deposit-level events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_state: Option<String>,
    pub snapshot: SessionSnapshot,
    pub emitted_at: u64,
}

impl SessionEvent {
    /// Event for a mint session.
    pub fn gateway(tag: EventTag, state: impl Into<String>, session: &GatewaySession) -> Self {
        Self {
            tag,
            session_id: session.id.clone(),
            state: state.into(),
            source_tx_hash: None,
            deposit_state: None,
            snapshot: SessionSnapshot::Gateway(session.clone()),
            emitted_at: rentx_types::now_millis(),
        }
    }

    /// Event for a burn session.
    pub fn burn(tag: EventTag, state: impl Into<String>, session: &BurnSession) -> Self {
        Self {
            tag,
            session_id: session.id.clone(),
            state: state.into(),
            source_tx_hash: session
                .transaction
                .as_ref()
                .map(|tx| tx.source_tx_hash.clone()),
            deposit_state: None,
            snapshot: SessionSnapshot::Burn(session.clone()),
            emitted_at: rentx_types::now_millis(),
        }
    }

    /// Scope a mint event to one deposit.
    #[must_use]
    pub fn for_deposit(mut self, source_tx_hash: impl Into<TxHash>, state: Option<String>) -> Self {
        self.source_tx_hash = Some(source_tx_hash.into());
        self.deposit_state = state;
        self
    }

    /// Topic used for filtering.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match (&self.snapshot, &self.source_tx_hash) {
            (SessionSnapshot::Burn(_), _) => EventTopic::Burn,
            (SessionSnapshot::Gateway(_), Some(_)) => EventTopic::Deposit,
            (SessionSnapshot::Gateway(_), None) => EventTopic::Mint,
        }
    }

    /// Mint session snapshot, if this is a mint event.
    #[must_use]
    pub fn gateway_session(&self) -> Option<&GatewaySession> {
        match &self.snapshot {
            SessionSnapshot::Gateway(session) => Some(session),
            SessionSnapshot::Burn(_) => None,
        }
    }

    /// Burn session snapshot, if this is a burn event.
    #[must_use]
    pub fn burn_session(&self) -> Option<&BurnSession> {
        match &self.snapshot {
            SessionSnapshot::Burn(session) => Some(session),
            SessionSnapshot::Gateway(_) => None,
        }
    }

    /// The deposit this event is about.
    #[must_use]
    pub fn deposit(&self) -> Option<&GatewayTransaction> {
        let hash = self.source_tx_hash.as_ref()?;
        self.gateway_session()?.transactions.get(hash)
    }

    /// The burn transaction, once submitted.
    #[must_use]
    pub fn burn_transaction(&self) -> Option<&BurnTransaction> {
        self.burn_session()?.transaction.as_ref()
    }
}

/// Event topics for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Gateway-level mint events.
    Mint,
    /// Per-deposit mint events.
    Deposit,
    /// Burn events.
    Burn,
    /// All events (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Sessions to include. Empty means all sessions.
    pub session_ids: Vec<String>,
    /// Tags to include. Empty means all tags.
    pub tags: Vec<EventTag>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            ..Self::default()
        }
    }

    /// Create a filter for one session.
    #[must_use]
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_ids: vec![session_id.into()],
            ..Self::default()
        }
    }

    /// Narrow the filter to specific tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<EventTag>) -> Self {
        self.tags = tags;
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &SessionEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let session_match =
            self.session_ids.is_empty() || self.session_ids.contains(&event.session_id);

        let tag_match = self.tags.is_empty() || self.tags.contains(&event.tag);

        topic_match && session_match && tag_match
    }
}
