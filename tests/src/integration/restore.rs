//! # Restore
//!
//! Snapshots taken from events or outcomes are fed into new orchestrators.
//! A restored session must never regenerate its nonce, burn twice, or mint a
//! deposit twice.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        burn_session, eventually, gateway_address, mint_session, wait_for, wait_for_deposit,
        Harness,
    };
    use rentx_bus::{EventTag, SessionEvent};
    use rentx_orchestrator::{
        BurnSessionApi, BurnState, GatewayState, InMemorySourceChain, MintSessionApi,
        OrchestratorConfig,
    };
    use rentx_types::{now_millis, BurnTransaction, CustomParams, ErrorKind, GatewaySession};
    use serde_json::json;

    /// Round-trip a snapshot through JSON, as a caller persisting it would.
    fn persisted(session: &GatewaySession) -> GatewaySession {
        let stored = serde_json::to_string(session).unwrap();
        serde_json::from_str(&stored).unwrap()
    }

    /// Run a fresh gateway until deposit `abc` emits `tag`, then stop it and
    /// return the final snapshot.
    async fn run_until(h: &Harness, config: OrchestratorConfig, tag: EventTag) -> GatewaySession {
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), config);
        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");
        wait_for_deposit(&mut sub, tag, "abc").await;

        handle.stop().unwrap();
        handle.join().await.unwrap().session
    }

    fn abc_state(event: &SessionEvent) -> Option<&str> {
        assert_eq!(event.source_tx_hash.as_deref(), Some("abc"));
        event.deposit_state.as_deref()
    }

    /// Start `snapshot` in a fresh gateway, wait for deposit `abc` to emit
    /// `tag`, stop, and report where the deposit resumed.
    async fn resume_once(
        h: &Harness,
        snapshot: &GatewaySession,
        config: OrchestratorConfig,
        tag: EventTag,
    ) -> (Option<String>, GatewayState) {
        let mut sub = h.subscribe();
        let handle = h.start_gateway(persisted(snapshot), config);
        let event = wait_for_deposit(&mut sub, tag, "abc").await;
        let resumed = abc_state(&event).map(str::to_string);
        handle.stop().unwrap();
        (resumed, handle.join().await.unwrap().state)
    }

    /// Signature requests, claim attempts and mints seen by the dest chain.
    fn dest_calls(h: &Harness) -> (u64, u64, usize) {
        (
            h.dest.signature_requests(),
            h.dest.claim_attempts(),
            h.dest.mint_count(),
        )
    }

    // =========================================================================
    // MINT
    // =========================================================================

    #[tokio::test]
    async fn test_signed_deposit_resumes_claimable() {
        let h = Harness::mint();
        let before = run_until(&h, Harness::config(), EventTag::Claimable).await;
        assert_eq!(h.dest.signature_requests(), 1);

        let mut sub = h.subscribe();
        let handle = h.start_gateway(persisted(&before), Harness::config());

        let restored = wait_for(&mut sub, EventTag::Restored).await;
        let snapshot = restored.gateway_session().unwrap();
        assert_eq!(snapshot.nonce, before.nonce);
        assert_eq!(snapshot.gateway_address, before.gateway_address);

        let claimable = wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;
        assert_eq!(abc_state(&claimable), Some("accepted"));
        assert_eq!(h.dest.signature_requests(), 1);

        handle.claim("abc", CustomParams::new()).unwrap();
        wait_for_deposit(&mut sub, EventTag::Submitted, "abc").await;
        handle.stop().unwrap();
        handle.join().await.unwrap();
        assert_eq!(h.dest.mint_count(), 1);
    }

    #[tokio::test]
    async fn test_claimed_deposit_is_not_minted_twice() {
        let h = Harness::mint();
        let config = Harness::config().with_auto_claim(true);
        let before = run_until(&h, config.clone(), EventTag::DestConfirmed).await;
        let first_hash = before.transactions["abc"].dest_tx_hash.clone().unwrap();
        assert_eq!(h.dest.claim_attempts(), 1);

        let mut sub = h.subscribe();
        let handle = h.start_gateway(persisted(&before), config);
        let submitted = wait_for_deposit(&mut sub, EventTag::Submitted, "abc").await;
        assert_eq!(abc_state(&submitted), Some("destInitiated"));
        assert_eq!(
            submitted.deposit().unwrap().dest_tx_hash.as_deref(),
            Some(first_hash.as_str())
        );

        // An explicit claim is ignored; the acknowledgement behind it completes.
        handle.claim("abc", CustomParams::new()).unwrap();
        handle.acknowledge("abc").unwrap();
        wait_for_deposit(&mut sub, EventTag::DepositCompleted, "abc").await;

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(
            outcome.session.transactions["abc"].dest_tx_hash,
            Some(first_hash)
        );
        assert_eq!(h.dest.mint_count(), 1);
        assert_eq!(h.dest.claim_attempts(), 1);
    }

    #[tokio::test]
    async fn test_completed_deposit_is_skipped() {
        let h = Harness::mint();
        let config = Harness::config()
            .with_auto_claim(true)
            .with_auto_acknowledge(true);
        let before = run_until(&h, config.clone(), EventTag::DepositCompleted).await;
        assert!(before.transactions["abc"].completed_at.is_some());
        let attempts = h.dest.claim_attempts();

        let mut sub = h.subscribe();
        let handle = h.start_gateway(persisted(&before), config);
        let completed = wait_for_deposit(&mut sub, EventTag::DepositCompleted, "abc").await;
        assert_eq!(abc_state(&completed), Some("completed"));

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(
            outcome.session.transactions["abc"].completed_at,
            before.transactions["abc"].completed_at
        );
        assert_eq!(h.dest.claim_attempts(), attempts);
        assert_eq!(h.dest.signature_requests(), 1);
    }

    #[tokio::test]
    async fn test_unconfirmed_deposit_resumes_settling() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.set_confirmations("abc", 2);
        wait_for_deposit(&mut sub, EventTag::DepositRestored, "abc").await;
        handle.stop().unwrap();
        let before = handle.join().await.unwrap().session;

        let handle = h.start_gateway(persisted(&before), Harness::config());
        let settling = wait_for_deposit(&mut sub, EventTag::DepositRestored, "abc").await;
        assert_eq!(abc_state(&settling), Some("srcSettling"));

        h.source.confirm("abc");
        wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;
        handle.stop().unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_deposit_without_payload_fails_restore() {
        let h = Harness::mint();
        let mut before = run_until(&h, Harness::config(), EventTag::Confirmed).await;
        if let Some(tx) = before.transactions.get_mut("abc") {
            tx.raw_source_tx = None;
            tx.signature = None;
            tx.source_tx_conf_target = None;
        }

        let mut sub = h.subscribe();
        let handle = h.start_gateway(before, Harness::config());
        let failed = wait_for_deposit(&mut sub, EventTag::RestoreError, "abc").await;
        assert_eq!(abc_state(&failed), Some("errorRestoring"));
        assert_eq!(
            failed.deposit().unwrap().error.as_ref().unwrap().kind,
            ErrorKind::Restore
        );

        handle.retry_deposit("abc").unwrap();
        wait_for_deposit(&mut sub, EventTag::RestoreError, "abc").await;
        handle.stop().unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_rotated_address_is_initialize_error() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        wait_for(&mut sub, EventTag::Listening).await;
        handle.stop().unwrap();
        let before = handle.join().await.unwrap().session;

        h.source.set_address_salt("rotated");
        let handle = h.start_gateway(persisted(&before), Harness::config());
        let failed = wait_for(&mut sub, EventTag::InitializeError).await;
        assert_eq!(failed.state, "srcInitializeError");
        let snapshot = failed.gateway_session().unwrap();
        assert_eq!(snapshot.error.as_ref().unwrap().kind, ErrorKind::Listening);
        // The stored address is kept, never re-derived.
        assert_eq!(snapshot.gateway_address, before.gateway_address);

        handle.stop().unwrap();
        assert_eq!(
            handle.join().await.unwrap().state,
            GatewayState::SrcInitializeError
        );
    }

    #[tokio::test]
    async fn test_expired_snapshot_does_not_listen() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        handle.stop().unwrap();
        let mut before = handle.join().await.unwrap().session;
        assert!(eventually(|| h.source.watcher_count(&address) == 0).await);

        before.expiry_time = now_millis().saturating_sub(1);
        let handle = h.start_gateway(before, Harness::config());
        let expired = wait_for(&mut sub, EventTag::Expired).await;
        assert_eq!(expired.state, "completed");
        assert_eq!(handle.join().await.unwrap().state, GatewayState::Completed);
        assert_eq!(h.source.watcher_count(&address), 0);
    }

    // =========================================================================
    // RESTORING TWICE
    // =========================================================================

    #[tokio::test]
    async fn test_settling_deposit_restores_twice_the_same() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.set_confirmations("abc", 2);
        wait_for_deposit(&mut sub, EventTag::DepositRestored, "abc").await;
        handle.stop().unwrap();
        let before = handle.join().await.unwrap().session;
        let calls = dest_calls(&h);

        for _ in 0..2 {
            let resumed =
                resume_once(&h, &before, Harness::config(), EventTag::DepositRestored).await;
            assert_eq!(
                resumed,
                (Some("srcSettling".to_string()), GatewayState::Listening)
            );
            assert_eq!(dest_calls(&h), calls);
        }
    }

    #[tokio::test]
    async fn test_signed_deposit_restores_twice_the_same() {
        let h = Harness::mint();
        let before = run_until(&h, Harness::config(), EventTag::Claimable).await;
        let calls = dest_calls(&h);
        assert_eq!(calls, (1, 0, 0));

        for _ in 0..2 {
            let resumed = resume_once(&h, &before, Harness::config(), EventTag::Claimable).await;
            assert_eq!(
                resumed,
                (Some("accepted".to_string()), GatewayState::Listening)
            );
            assert_eq!(dest_calls(&h), calls);
        }
    }

    #[tokio::test]
    async fn test_claimed_deposit_restores_twice_the_same() {
        let h = Harness::mint();
        let config = Harness::config().with_auto_claim(true);
        let before = run_until(&h, config.clone(), EventTag::DestConfirmed).await;
        let calls = dest_calls(&h);
        assert_eq!(calls, (1, 1, 1));

        for _ in 0..2 {
            let resumed = resume_once(&h, &before, config.clone(), EventTag::Submitted).await;
            assert_eq!(
                resumed,
                (Some("destInitiated".to_string()), GatewayState::Listening)
            );
            assert_eq!(dest_calls(&h), calls);
        }
    }

    #[tokio::test]
    async fn test_submitted_burn_restores_twice_the_same() {
        let h = Harness::burn();
        let mut session = burn_session("0.001");
        session.suggested_amount = Some(100_000);
        session.transaction = Some(BurnTransaction::submitted("0xprior", 100_000, 1));
        h.source.set_confirmations("0xprior", 1);
        let config = Harness::config().with_auto_submit(true);

        for _ in 0..2 {
            let mut sub = h.subscribe();
            let handle = h.start_burn(session.clone(), config.clone());
            let restored = wait_for(&mut sub, EventTag::Restored).await;
            assert_eq!(restored.state, "srcSettling");
            assert_eq!(restored.source_tx_hash.as_deref(), Some("0xprior"));

            handle.stop().unwrap();
            assert_eq!(handle.join().await.unwrap().state, BurnState::SrcSettling);
            assert_eq!(h.source.burn_count(), 0);
            assert_eq!(h.dest.release_requests(), 0);
        }
    }

    // =========================================================================
    // BURN
    // =========================================================================

    #[tokio::test]
    async fn test_submitted_burn_is_not_burned_again() {
        let h = Harness::burn();
        let mut session = burn_session("0.001");
        session.suggested_amount = Some(100_000);
        session.transaction = Some(BurnTransaction::submitted("0xprior", 100_000, 1));
        h.source.set_confirmations("0xprior", 1);

        let mut sub = h.subscribe();
        let handle = h.start_burn(session, Harness::config().with_auto_submit(true));
        let restored = wait_for(&mut sub, EventTag::Restored).await;
        assert_eq!(restored.state, "srcSettling");
        assert_eq!(restored.source_tx_hash.as_deref(), Some("0xprior"));

        h.source.confirm("0xprior");
        let released = wait_for(&mut sub, EventTag::Released).await;
        assert_eq!(released.source_tx_hash.as_deref(), Some("0xprior"));

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, BurnState::DestInitiated);
        assert_eq!(h.source.burn_count(), 0);
        assert_eq!(h.dest.release_count(), 1);
    }

    #[tokio::test]
    async fn test_confirmed_burn_goes_straight_to_release() {
        let h = Harness::burn();
        let mut tx = BurnTransaction::submitted("0xprior", 100_000, 1);
        tx.source_tx_confs = 6;
        tx.source_tx_conf_target = Some(6);
        let mut session = burn_session("0.001");
        session.transaction = Some(tx);

        let mut sub = h.subscribe();
        let handle = h.start_burn(session, Harness::config());
        let confirmed = wait_for(&mut sub, EventTag::Confirmed).await;
        assert_eq!(confirmed.state, "srcConfirmed");
        wait_for(&mut sub, EventTag::Released).await;

        handle.join().await.unwrap();
        assert_eq!(h.source.burn_count(), 0);
    }

    #[tokio::test]
    async fn test_released_burn_restores_as_done() {
        let h = Harness::burn();
        let mut tx = BurnTransaction::submitted("0xprior", 100_000, 1);
        tx.ren_vm_hash = Some("renvm-0xprior".to_string());
        tx.ren_response = Some(json!({ "amount": 100_000 }));
        tx.completed_at = Some(2);
        let mut session = burn_session("0.001");
        session.transaction = Some(tx);

        let mut sub = h.subscribe();
        let handle = h.start_burn(session, Harness::config());
        let released = wait_for(&mut sub, EventTag::Released).await;
        assert_eq!(released.state, "destInitiated");

        assert_eq!(handle.join().await.unwrap().state, BurnState::DestInitiated);
        assert_eq!(h.dest.release_requests(), 0);
        assert_eq!(h.source.burn_count(), 0);
    }
}
