//! # Gateway Machine
//!
//! Root of a mint session. Owns the session record, decides when to create the
//! gateway address, and tracks which deposits have a live child.
//!
//! Deposits restored from the snapshot are spawned before the listener starts,
//! so a detection for a hash already in `live` or `transactions` is a
//! duplicate and is ignored (first writer wins).

use super::Transition;
use crate::domain::{
    invariant_gateway_stable, set_once, DepositState, GatewayCreation, GatewayState,
};
use rentx_bus::EventTag;
use rentx_types::{GatewaySession, GatewayTransaction, SessionError, TxHash};
use std::collections::{BTreeMap, BTreeSet};

/// Automatic follow-up actions on deposit events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatewayPolicy {
    /// Claim with empty contract params once a deposit is claimable.
    pub auto_claim: bool,
    /// Acknowledge once the destination chain confirms the claim.
    pub auto_acknowledge: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GatewayContext {
    /// Canonical session record.
    pub session: GatewaySession,
    /// Deposits with a running child.
    pub live: BTreeSet<TxHash>,
    /// Last reported state of every deposit seen this run.
    pub deposit_states: BTreeMap<TxHash, DepositState>,
    pub policy: GatewayPolicy,
}

impl GatewayContext {
    pub fn new(session: GatewaySession, policy: GatewayPolicy) -> Self {
        Self {
            session,
            live: BTreeSet::new(),
            deposit_states: BTreeMap::new(),
            policy,
        }
    }

    /// Last known state of one deposit.
    pub fn deposit_state(&self, source_tx_hash: &str) -> Option<DepositState> {
        self.deposit_states.get(source_tx_hash).copied()
    }
}

/// Inputs to the gateway machine.
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEvent {
    /// First event after spawn.
    Restore { now_ms: u64 },
    Created(GatewayCreation),
    CreateFailed(SessionError),
    /// The listener could not start or lost its subscription.
    ListenerFailed(SessionError),
    /// The listener saw a deposit.
    Deposit(GatewayTransaction),
    /// A child published progress.
    DepositUpdated {
        deposit: GatewayTransaction,
        state: DepositState,
        tag: EventTag,
    },
    /// A child reached `completed`.
    DepositCompleted(GatewayTransaction),
    Expired,
    Retry { now_ms: u64 },
}

impl GatewayEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Restore { .. } => "RESTORE",
            Self::Created(_) => "CREATED",
            Self::CreateFailed(_) => "CREATE_ERROR",
            Self::ListenerFailed(_) => "LISTENER_ERROR",
            Self::Deposit(_) => "DEPOSIT",
            Self::DepositUpdated { .. } => "DEPOSIT_UPDATED",
            Self::DepositCompleted(_) => "DEPOSIT_COMPLETED",
            Self::Expired => "EXPIRED",
            Self::Retry { .. } => "RETRY",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GatewayEffect {
    /// Derive nonce and gateway address.
    CreateGateway,
    /// Start a deposit child at `checkingCompletion`.
    SpawnDeposit(GatewayTransaction),
    StartListener,
    StopDeposit(TxHash),
    /// Stop the listener and every child.
    StopAll,
    ClaimDeposit(TxHash),
    AcknowledgeDeposit(TxHash),
    Emit {
        tag: EventTag,
        source_tx_hash: Option<TxHash>,
    },
}

impl GatewayEffect {
    fn emit(tag: EventTag) -> Self {
        Self::Emit {
            tag,
            source_tx_hash: None,
        }
    }

    fn emit_for(tag: EventTag, source_tx_hash: &str) -> Self {
        Self::Emit {
            tag,
            source_tx_hash: Some(source_tx_hash.to_string()),
        }
    }
}

pub type GatewayTransition = Transition<GatewayState, GatewayContext, GatewayEffect>;

/// Feed one event to the gateway machine.
pub fn transition(
    state: GatewayState,
    event: GatewayEvent,
    mut ctx: GatewayContext,
) -> GatewayTransition {
    use GatewayEffect as Fx;
    use GatewayEvent as Ev;
    use GatewayState as St;

    match (state, event) {
        (St::Completed, _) => Transition::unchanged(St::Completed, ctx),

        (St::Restoring, Ev::Restore { now_ms }) => restore(ctx, now_ms),
        (St::SrcInitializeError, Ev::Retry { now_ms }) => restore(ctx, now_ms),

        (St::Creating, Ev::Created(creation)) => {
            let before = ctx.session.clone();
            let session = &mut ctx.session;
            set_once(&mut session.nonce, creation.nonce);
            set_once(&mut session.gateway_address, creation.gateway_address);
            if creation.suggested_amount.is_some() {
                session.suggested_amount = creation.suggested_amount;
            }
            debug_assert!(invariant_gateway_stable(&before, &ctx.session));
            listen(ctx, vec![Fx::emit(EventTag::GatewayCreated)])
        }
        (St::Creating, Ev::CreateFailed(error)) => {
            ctx.session.error = Some(error);
            Transition::new(
                St::SrcInitializeError,
                ctx,
                vec![Fx::emit(EventTag::InitializeError)],
            )
        }

        (St::Listening, Ev::ListenerFailed(error)) => {
            ctx.session.error = Some(error);
            ctx.live.clear();
            ctx.deposit_states.clear();
            Transition::new(
                St::SrcInitializeError,
                ctx,
                vec![Fx::StopAll, Fx::emit(EventTag::InitializeError)],
            )
        }

        (St::Listening, Ev::Deposit(deposit)) => {
            let hash = deposit.source_tx_hash.clone();
            if ctx.live.contains(&hash) || ctx.session.transactions.contains_key(&hash) {
                return Transition::unchanged(St::Listening, ctx);
            }
            ctx.session.transactions.insert(hash.clone(), deposit.clone());
            ctx.live.insert(hash.clone());
            ctx.deposit_states
                .insert(hash.clone(), DepositState::CheckingCompletion);
            Transition::new(
                St::Listening,
                ctx,
                vec![
                    Fx::SpawnDeposit(deposit),
                    Fx::emit_for(EventTag::Deposit, &hash),
                ],
            )
        }

        (St::Listening, Ev::DepositUpdated {
            deposit,
            state: deposit_state,
            tag,
        }) => {
            let hash = deposit.source_tx_hash.clone();
            if !ctx.live.contains(&hash) {
                return Transition::unchanged(St::Listening, ctx);
            }
            if tag.is_error() {
                if let Some(error) = &deposit.error {
                    ctx.session.error = Some(error.clone());
                }
            }
            ctx.session.transactions.insert(hash.clone(), deposit);
            ctx.deposit_states.insert(hash.clone(), deposit_state);

            let mut effects = vec![Fx::emit_for(tag, &hash)];
            if tag == EventTag::Claimable && ctx.policy.auto_claim {
                effects.push(Fx::ClaimDeposit(hash.clone()));
            }
            if tag == EventTag::DestConfirmed && ctx.policy.auto_acknowledge {
                effects.push(Fx::AcknowledgeDeposit(hash));
            }
            Transition::new(St::Listening, ctx, effects)
        }

        (St::Listening, Ev::DepositCompleted(deposit)) => {
            let hash = deposit.source_tx_hash.clone();
            if !ctx.live.remove(&hash) {
                return Transition::unchanged(St::Listening, ctx);
            }
            ctx.session.transactions.insert(hash.clone(), deposit);
            ctx.deposit_states
                .insert(hash.clone(), DepositState::Completed);
            Transition::new(
                St::Listening,
                ctx,
                vec![
                    Fx::StopDeposit(hash.clone()),
                    Fx::emit_for(EventTag::DepositCompleted, &hash),
                ],
            )
        }

        (_, Ev::Expired) => {
            ctx.live.clear();
            Transition::new(
                St::Completed,
                ctx,
                vec![Fx::StopAll, Fx::emit(EventTag::Expired)],
            )
        }

        (state, _) => Transition::unchanged(state, ctx),
    }
}

/// Decide where a loaded session resumes.
fn restore(ctx: GatewayContext, now_ms: u64) -> GatewayTransition {
    use GatewayEffect as Fx;

    if ctx.session.is_expired(now_ms) {
        return Transition::new(
            GatewayState::Completed,
            ctx,
            vec![Fx::emit(EventTag::Expired)],
        );
    }
    if ctx.session.gateway_address.is_some() {
        return listen(ctx, vec![Fx::emit(EventTag::Restored)]);
    }
    Transition::new(
        GatewayState::Creating,
        ctx,
        vec![Fx::emit(EventTag::Creating), Fx::CreateGateway],
    )
}

/// Enter `listening`: children for persisted deposits first, then the listener.
fn listen(mut ctx: GatewayContext, mut effects: Vec<GatewayEffect>) -> GatewayTransition {
    let persisted: Vec<GatewayTransaction> = ctx.session.transactions.values().cloned().collect();
    for deposit in persisted {
        let hash = deposit.source_tx_hash.clone();
        if ctx.live.insert(hash.clone()) {
            ctx.deposit_states
                .insert(hash, DepositState::CheckingCompletion);
            effects.push(GatewayEffect::SpawnDeposit(deposit));
        }
    }
    effects.push(GatewayEffect::StartListener);
    effects.push(GatewayEffect::emit(EventTag::Listening));
    Transition::new(GatewayState::Listening, ctx, effects)
}
