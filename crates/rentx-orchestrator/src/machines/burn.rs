//! # Burn Machine
//!
//! Burn-and-release for one session. The presence of `transaction` is what
//! marks a burn as submitted, so a restored session never burns twice.

use super::Transition;
use crate::domain::{apply_confirmations, set_once, BurnState, ReleaseResponse};
use rentx_bus::EventTag;
use rentx_types::{BurnSession, BurnTransaction, SessionError, TxHash};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BurnPolicy {
    /// Submit as soon as the amount is known.
    pub auto_submit: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BurnContext {
    pub session: BurnSession,
    pub burn_in_flight: bool,
    pub release_in_flight: bool,
    pub policy: BurnPolicy,
}

impl BurnContext {
    pub fn new(session: BurnSession, policy: BurnPolicy) -> Self {
        Self {
            session,
            burn_in_flight: false,
            release_in_flight: false,
            policy,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BurnEvent {
    /// First event after spawn.
    Restore,
    Created { suggested_amount: u64 },
    CreateFailed(SessionError),
    /// Caller asks to broadcast the burn.
    Submit,
    Submitted { source_tx_hash: TxHash, now_ms: u64 },
    SubmitFailed(SessionError),
    Confirmation { current: u64, target: Option<u64> },
    Confirmed { current: u64, target: u64 },
    ConfirmationFailed(SessionError),
    /// RenVM accepted the release request.
    Accepted { ren_vm_hash: String },
    /// Destination chain transaction seen before the release finished.
    DestTransaction { dest_tx_hash: String },
    Released { response: ReleaseResponse, now_ms: u64 },
    ReleaseFailed(SessionError),
    Retry,
}

impl BurnEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Restore => "RESTORE",
            Self::Created { .. } => "CREATED",
            Self::CreateFailed(_) => "CREATE_ERROR",
            Self::Submit => "SUBMIT",
            Self::Submitted { .. } => "SUBMITTED",
            Self::SubmitFailed(_) => "SUBMIT_ERROR",
            Self::Confirmation { .. } => "CONFIRMATION",
            Self::Confirmed { .. } => "CONFIRMED",
            Self::ConfirmationFailed(_) => "CONFIRMATION_ERROR",
            Self::Accepted { .. } => "ACCEPTED",
            Self::DestTransaction { .. } => "DEST_TRANSACTION",
            Self::Released { .. } => "RELEASED",
            Self::ReleaseFailed(_) => "RELEASE_ERROR",
            Self::Retry => "RETRY",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum BurnEffect {
    /// Compute the amount to burn.
    CreateBurn,
    SubmitBurn,
    WatchConfirmations(TxHash),
    RequestRelease(BurnTransaction),
    Emit(EventTag),
}

pub type BurnTransition = Transition<BurnState, BurnContext, BurnEffect>;

/// Feed one event to the burn machine.
pub fn transition(state: BurnState, event: BurnEvent, mut ctx: BurnContext) -> BurnTransition {
    use BurnEffect as Fx;
    use BurnEvent as Ev;
    use BurnState as St;

    match (state, event) {
        (St::Restoring, Ev::Restore) => restore(ctx),

        (St::Creating, Ev::Created { suggested_amount }) => {
            ctx.session.suggested_amount = Some(suggested_amount);
            let mut effects = vec![Fx::Emit(EventTag::BurnCreated)];
            if ctx.policy.auto_submit {
                ctx.burn_in_flight = true;
                effects.push(Fx::SubmitBurn);
            }
            Transition::new(St::Created, ctx, effects)
        }
        (St::Creating, Ev::CreateFailed(error)) => {
            ctx.session.error = Some(error);
            Transition::new(St::CreateError, ctx, vec![Fx::Emit(EventTag::CreateError)])
        }
        (St::CreateError, Ev::Retry) => Transition::new(St::Creating, ctx, vec![Fx::CreateBurn]),

        (St::Created, Ev::Submit) => {
            if ctx.burn_in_flight || ctx.session.transaction.is_some() {
                return Transition::unchanged(St::Created, ctx);
            }
            ctx.burn_in_flight = true;
            Transition::new(St::Created, ctx, vec![Fx::SubmitBurn])
        }
        (St::Created, Ev::Submitted {
            source_tx_hash,
            now_ms,
        }) => {
            ctx.burn_in_flight = false;
            let amount = ctx.session.suggested_amount.unwrap_or_default();
            let tx = BurnTransaction::submitted(source_tx_hash.clone(), amount, now_ms);
            ctx.session.transaction = Some(tx);
            Transition::new(
                St::SrcSettling,
                ctx,
                vec![
                    Fx::Emit(EventTag::BurnSubmitted),
                    Fx::WatchConfirmations(source_tx_hash),
                ],
            )
        }
        (St::Created, Ev::SubmitFailed(error)) => {
            ctx.burn_in_flight = false;
            burn_error(ctx, error)
        }
        (St::ErrorBurning, Ev::Retry) => match &ctx.session.transaction {
            Some(tx) => {
                let watch = Fx::WatchConfirmations(tx.source_tx_hash.clone());
                Transition::new(St::SrcSettling, ctx, vec![watch])
            }
            None => {
                ctx.burn_in_flight = true;
                Transition::new(St::Created, ctx, vec![Fx::SubmitBurn])
            }
        },

        (St::SrcSettling, Ev::Confirmation { current, target }) => {
            let Some(tx) = ctx.session.transaction.as_mut() else {
                return Transition::unchanged(St::SrcSettling, ctx);
            };
            let changed = apply_confirmations(
                &mut tx.source_tx_confs,
                &mut tx.source_tx_conf_target,
                current,
                target,
            );
            if tx.is_confirmed() {
                confirm(ctx)
            } else if changed {
                Transition::new(St::SrcSettling, ctx, vec![Fx::Emit(EventTag::Confirmation)])
            } else {
                Transition::unchanged(St::SrcSettling, ctx)
            }
        }
        (St::SrcSettling, Ev::Confirmed { current, target }) => {
            let Some(tx) = ctx.session.transaction.as_mut() else {
                return Transition::unchanged(St::SrcSettling, ctx);
            };
            apply_confirmations(
                &mut tx.source_tx_confs,
                &mut tx.source_tx_conf_target,
                current,
                Some(target),
            );
            confirm(ctx)
        }
        (St::SrcSettling, Ev::ConfirmationFailed(error)) => burn_error(ctx, error),

        (St::SrcConfirmed, Ev::Accepted { ren_vm_hash }) => {
            let Some(tx) = ctx.session.transaction.as_mut() else {
                return Transition::unchanged(St::SrcConfirmed, ctx);
            };
            if set_once(&mut tx.ren_vm_hash, ren_vm_hash) {
                Transition::new(St::SrcConfirmed, ctx, vec![Fx::Emit(EventTag::Accepted)])
            } else {
                Transition::unchanged(St::SrcConfirmed, ctx)
            }
        }
        (St::SrcConfirmed, Ev::DestTransaction { dest_tx_hash }) => {
            if let Some(tx) = ctx.session.transaction.as_mut() {
                set_once(&mut tx.dest_tx_hash, dest_tx_hash);
            }
            Transition::unchanged(St::SrcConfirmed, ctx)
        }
        (St::SrcConfirmed, Ev::Released { response, now_ms }) => {
            ctx.release_in_flight = false;
            let Some(tx) = ctx.session.transaction.as_mut() else {
                return Transition::unchanged(St::SrcConfirmed, ctx);
            };
            if let Some(hash) = response.ren_vm_hash {
                set_once(&mut tx.ren_vm_hash, hash);
            }
            // Some destination chains never report a hash.
            if let Some(hash) = response.dest_tx_hash {
                set_once(&mut tx.dest_tx_hash, hash);
            }
            tx.ren_response = Some(response.response);
            tx.completed_at = Some(now_ms);
            Transition::new(St::DestInitiated, ctx, vec![Fx::Emit(EventTag::Released)])
        }
        (St::SrcConfirmed, Ev::ReleaseFailed(error)) => {
            ctx.release_in_flight = false;
            if let Some(tx) = ctx.session.transaction.as_mut() {
                tx.error = Some(error.clone());
            }
            ctx.session.error = Some(error);
            Transition::new(
                St::ErrorReleasing,
                ctx,
                vec![Fx::Emit(EventTag::ReleaseError)],
            )
        }
        (St::ErrorReleasing, Ev::Retry) => request_release(ctx, Vec::new()),

        (state, _) => Transition::unchanged(state, ctx),
    }
}

/// Resume at the most advanced state the transaction record supports.
fn restore(ctx: BurnContext) -> BurnTransition {
    use BurnEffect as Fx;

    let Some(tx) = ctx.session.transaction.as_ref() else {
        return Transition::new(
            BurnState::Creating,
            ctx,
            vec![Fx::Emit(EventTag::Creating), Fx::CreateBurn],
        );
    };
    if tx.is_released() {
        Transition::new(
            BurnState::DestInitiated,
            ctx,
            vec![Fx::Emit(EventTag::Released)],
        )
    } else if tx.ren_vm_hash.is_some() || tx.is_confirmed() {
        request_release(ctx, vec![Fx::Emit(EventTag::Confirmed)])
    } else {
        let watch = Fx::WatchConfirmations(tx.source_tx_hash.clone());
        Transition::new(
            BurnState::SrcSettling,
            ctx,
            vec![Fx::Emit(EventTag::Restored), watch],
        )
    }
}

fn confirm(ctx: BurnContext) -> BurnTransition {
    request_release(ctx, vec![BurnEffect::Emit(EventTag::Confirmed)])
}

fn request_release(mut ctx: BurnContext, mut effects: Vec<BurnEffect>) -> BurnTransition {
    let Some(tx) = ctx.session.transaction.clone() else {
        return Transition::unchanged(BurnState::SrcConfirmed, ctx);
    };
    ctx.release_in_flight = true;
    effects.push(BurnEffect::RequestRelease(tx));
    Transition::new(BurnState::SrcConfirmed, ctx, effects)
}

fn burn_error(mut ctx: BurnContext, error: SessionError) -> BurnTransition {
    if let Some(tx) = ctx.session.transaction.as_mut() {
        tx.error = Some(error.clone());
    }
    ctx.session.error = Some(error);
    Transition::new(
        BurnState::ErrorBurning,
        ctx,
        vec![BurnEffect::Emit(EventTag::BurnError)],
    )
}
