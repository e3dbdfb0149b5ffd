//! # Deposit Machine
//!
//! Drives one deposit through confirmation, signing and claiming.
//!
//! ```text
//! checkingCompletion ─┬─▶ completed
//!                     └─▶ restoringDeposit ─┬─▶ errorRestoring ─(retry)─┐
//!                                           └─▶ restoredDeposit ◀───────┘
//! restoredDeposit ─▶ srcSettling | srcConfirmed | accepted | destInitiated
//! srcSettling ─▶ srcConfirmed ─┬─▶ accepted ─┬─▶ claiming ─┬─▶ destInitiated ─(ack)─▶ completed
//!                              ├─▶ errorAccepting       │  └─▶ errorSubmitting ─(claim)─▶ claiming
//!                              └─▶ reverted              └─▶ rejected
//! ```
//!
//! The machine never completes on its own: `destInitiated` waits for an
//! explicit acknowledgement.

use super::Transition;
use crate::domain::{
    apply_confirmations, invariant_completed_has_dest, invariant_dest_after_signature, set_once,
    DepositState, RenSignature,
};
use rentx_bus::EventTag;
use rentx_types::{CustomParams, GatewayTransaction, SessionError, TxHash};

/// State private to one deposit machine.
#[derive(Clone, Debug, PartialEq)]
pub struct DepositContext {
    /// The machine's own copy; the gateway holds the canonical one.
    pub deposit: GatewayTransaction,
    /// A mint submission is outstanding.
    pub claim_in_flight: bool,
    /// A signature request is outstanding.
    pub sign_in_flight: bool,
}

impl DepositContext {
    pub fn new(deposit: GatewayTransaction) -> Self {
        Self {
            deposit,
            claim_in_flight: false,
            sign_in_flight: false,
        }
    }
}

/// Inputs to the deposit machine.
#[derive(Clone, Debug, PartialEq)]
pub enum DepositEvent {
    /// First event after spawn.
    Check,
    /// The listener re-attached the deposit.
    Restored(GatewayTransaction),
    RestoreFailed(SessionError),
    Confirmation { current: u64, target: Option<u64> },
    Confirmed { current: u64, target: u64 },
    ConfirmationFailed(SessionError),
    Signed(RenSignature),
    SignFailed(SessionError),
    /// RenVM refused the deposit. Final.
    Reverted(SessionError),
    /// Caller or auto-claim policy supplies contract parameters.
    Claim(CustomParams),
    Submitted { dest_tx_hash: String },
    SubmitFailed(SessionError),
    DestConfirmed,
    Acknowledge { now_ms: u64 },
    Reject,
    Retry,
}

impl DepositEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Check => "CHECK",
            Self::Restored(_) => "RESTORED",
            Self::RestoreFailed(_) => "RESTORE_ERROR",
            Self::Confirmation { .. } => "CONFIRMATION",
            Self::Confirmed { .. } => "CONFIRMED",
            Self::ConfirmationFailed(_) => "CONFIRMATION_ERROR",
            Self::Signed(_) => "SIGNED",
            Self::SignFailed(_) => "SIGN_ERROR",
            Self::Reverted(_) => "REVERTED",
            Self::Claim(_) => "CLAIM",
            Self::Submitted { .. } => "SUBMITTED",
            Self::SubmitFailed(_) => "SUBMIT_ERROR",
            Self::DestConfirmed => "DEST_CONFIRMED",
            Self::Acknowledge { .. } => "ACKNOWLEDGE",
            Self::Reject => "REJECT",
            Self::Retry => "RETRY",
        }
    }
}

/// Requests the deposit actor sends to its gateway.
#[derive(Clone, Debug, PartialEq)]
pub enum DepositEffect {
    RequestRestore(GatewayTransaction),
    RequestSettle(TxHash),
    RequestSign(GatewayTransaction),
    RequestMint {
        deposit: GatewayTransaction,
        params: CustomParams,
    },
    /// Publish the current record with this tag.
    Publish(EventTag),
    /// Acknowledged or already finished; the gateway can prune.
    Completed,
}

pub type DepositTransition = Transition<DepositState, DepositContext, DepositEffect>;

/// Feed one event to the deposit machine.
pub fn transition(
    state: DepositState,
    event: DepositEvent,
    mut ctx: DepositContext,
) -> DepositTransition {
    use DepositEffect as Fx;
    use DepositEvent as Ev;
    use DepositState as St;

    match (state, event) {
        (St::CheckingCompletion, Ev::Check) => {
            if ctx.deposit.is_completed() {
                Transition::new(St::Completed, ctx, vec![Fx::Completed])
            } else {
                let restore = Fx::RequestRestore(ctx.deposit.clone());
                Transition::new(St::RestoringDeposit, ctx, vec![restore])
            }
        }

        (St::RestoringDeposit, Ev::Restored(restored)) => {
            merge_restored(&mut ctx.deposit, restored);
            resume(ctx)
        }
        (St::RestoringDeposit, Ev::RestoreFailed(error)) => {
            ctx.deposit.error = Some(error);
            Transition::new(St::ErrorRestoring, ctx, vec![Fx::Publish(EventTag::RestoreError)])
        }
        (St::ErrorRestoring, Ev::Retry) => {
            let restore = Fx::RequestRestore(ctx.deposit.clone());
            Transition::new(St::RestoringDeposit, ctx, vec![restore])
        }

        (St::SrcSettling, Ev::Confirmation { current, target }) => {
            let tx = &mut ctx.deposit;
            let changed = apply_confirmations(
                &mut tx.source_tx_confs,
                &mut tx.source_tx_conf_target,
                current,
                target,
            );
            if ctx.deposit.is_confirmed() {
                confirm(ctx)
            } else if changed {
                Transition::new(St::SrcSettling, ctx, vec![Fx::Publish(EventTag::Confirmation)])
            } else {
                Transition::unchanged(St::SrcSettling, ctx)
            }
        }
        (St::SrcSettling, Ev::Confirmed { current, target }) => {
            let tx = &mut ctx.deposit;
            apply_confirmations(
                &mut tx.source_tx_confs,
                &mut tx.source_tx_conf_target,
                current,
                Some(target),
            );
            confirm(ctx)
        }
        (St::SrcSettling, Ev::ConfirmationFailed(error)) => {
            ctx.deposit.error = Some(error);
            Transition::new(
                St::SrcSettling,
                ctx,
                vec![Fx::Publish(EventTag::ConfirmationError)],
            )
        }
        (St::SrcSettling, Ev::Retry) => {
            let settle = Fx::RequestSettle(ctx.deposit.source_tx_hash.clone());
            Transition::new(St::SrcSettling, ctx, vec![settle])
        }

        (St::SrcConfirmed, Ev::Signed(signature)) => {
            ctx.sign_in_flight = false;
            let tx = &mut ctx.deposit;
            set_once(&mut tx.ren_vm_hash, signature.ren_vm_hash);
            tx.signature = Some(signature.signature);
            tx.ren_response = Some(signature.response);
            Transition::new(St::Accepted, ctx, vec![Fx::Publish(EventTag::Claimable)])
        }
        (St::SrcConfirmed, Ev::SignFailed(error)) => {
            ctx.sign_in_flight = false;
            ctx.deposit.error = Some(error);
            Transition::new(St::ErrorAccepting, ctx, vec![Fx::Publish(EventTag::SignError)])
        }
        (St::SrcConfirmed, Ev::Reverted(error)) => {
            ctx.sign_in_flight = false;
            ctx.deposit.error = Some(error);
            Transition::new(St::Reverted, ctx, vec![Fx::Publish(EventTag::Reverted)])
        }
        (St::ErrorAccepting, Ev::Retry) => {
            ctx.sign_in_flight = true;
            let sign = Fx::RequestSign(ctx.deposit.clone());
            Transition::new(St::SrcConfirmed, ctx, vec![sign])
        }

        (St::Accepted | St::ErrorSubmitting, Ev::Claim(params)) if !ctx.claim_in_flight => {
            ctx.claim_in_flight = true;
            ctx.deposit.contract_params = Some(params.clone());
            let mint = Fx::RequestMint {
                deposit: ctx.deposit.clone(),
                params,
            };
            Transition::new(
                St::Claiming,
                ctx,
                vec![Fx::Publish(EventTag::Claiming), mint],
            )
        }
        (St::Accepted | St::ErrorSubmitting, Ev::Reject) => {
            Transition::new(St::Rejected, ctx, vec![Fx::Publish(EventTag::Rejected)])
        }

        (St::Claiming, Ev::Submitted { dest_tx_hash }) => {
            ctx.claim_in_flight = false;
            set_once(&mut ctx.deposit.dest_tx_hash, dest_tx_hash);
            debug_assert!(invariant_dest_after_signature(&ctx.deposit));
            Transition::new(St::DestInitiated, ctx, vec![Fx::Publish(EventTag::Submitted)])
        }
        (St::Claiming, Ev::SubmitFailed(error)) => {
            ctx.claim_in_flight = false;
            ctx.deposit.error = Some(error);
            Transition::new(
                St::ErrorSubmitting,
                ctx,
                vec![Fx::Publish(EventTag::SubmitError)],
            )
        }

        (St::DestInitiated, Ev::DestConfirmed) => Transition::new(
            St::DestInitiated,
            ctx,
            vec![Fx::Publish(EventTag::DestConfirmed)],
        ),
        (St::DestInitiated, Ev::Acknowledge { now_ms }) => {
            ctx.deposit.completed_at = Some(now_ms);
            debug_assert!(invariant_completed_has_dest(&ctx.deposit));
            Transition::new(St::Completed, ctx, vec![Fx::Completed])
        }

        // Duplicate claims while claiming, late progress and anything else
        // the current state does not handle.
        (state, _) => Transition::unchanged(state, ctx),
    }
}

/// Keep locally known progress; take confirmations and payload from the
/// listener when they are newer.
fn merge_restored(current: &mut GatewayTransaction, restored: GatewayTransaction) {
    apply_confirmations(
        &mut current.source_tx_confs,
        &mut current.source_tx_conf_target,
        restored.source_tx_confs,
        restored.source_tx_conf_target,
    );
    if current.raw_source_tx.is_none() {
        current.raw_source_tx = restored.raw_source_tx;
    }
}

/// Resolve `restoredDeposit` to the most advanced state the record supports.
/// A deposit with a destination hash was already claimed and is never
/// claimed again.
fn resume(ctx: DepositContext) -> DepositTransition {
    use DepositEffect as Fx;

    if ctx.deposit.dest_tx_hash.is_some() {
        Transition::new(
            DepositState::DestInitiated,
            ctx,
            vec![Fx::Publish(EventTag::Submitted)],
        )
    } else if ctx.deposit.is_signed() {
        Transition::new(
            DepositState::Accepted,
            ctx,
            vec![Fx::Publish(EventTag::Claimable)],
        )
    } else if ctx.deposit.is_confirmed() {
        confirm(ctx)
    } else {
        let settle = Fx::RequestSettle(ctx.deposit.source_tx_hash.clone());
        Transition::new(
            DepositState::SrcSettling,
            ctx,
            vec![Fx::Publish(EventTag::DepositRestored), settle],
        )
    }
}

fn confirm(mut ctx: DepositContext) -> DepositTransition {
    ctx.sign_in_flight = true;
    let sign = DepositEffect::RequestSign(ctx.deposit.clone());
    Transition::new(
        DepositState::SrcConfirmed,
        ctx,
        vec![DepositEffect::Publish(EventTag::Confirmed), sign],
    )
}
