//! # Burn Flow
//!
//! Burn creation, submission, confirmation and release through the burn
//! orchestrator.

#[cfg(test)]
mod tests {
    use crate::fixtures::{burn_session, wait_for, Harness};
    use rentx_bus::{EventFilter, EventTag, EventTopic};
    use rentx_orchestrator::{
        BurnOrchestrator, BurnSessionApi, BurnState, ChainRegistry, FeeSchedule,
        InMemoryDestinationChain, OrchestratorError,
    };
    use rentx_types::ErrorKind;
    use std::sync::Arc;
    use tracing::Instrument;

    #[tokio::test]
    async fn test_burn_end_to_end() {
        let h = Harness::burn();
        let mut sub = h.subscribe();
        let handle = h.start_burn(burn_session("0.001"), Harness::config());
        let span = rentx_telemetry::session_span!("burn", session_id = %handle.session_id());

        async {
            let creating = wait_for(&mut sub, EventTag::Creating).await;
            assert_eq!(creating.state, "creating");

            let created = wait_for(&mut sub, EventTag::BurnCreated).await;
            assert_eq!(created.state, "created");
            assert_eq!(created.burn_session().unwrap().suggested_amount, Some(100_000));
            assert_eq!(h.source.burn_count(), 0);

            handle.submit().unwrap();
            let submitted = wait_for(&mut sub, EventTag::BurnSubmitted).await;
            let hash = submitted.source_tx_hash.clone().unwrap();
            let tx = submitted.burn_transaction().unwrap();
            assert_eq!(tx.source_tx_amount, 100_000);

            h.source.set_confirmations(&hash, 3);
            let progress = wait_for(&mut sub, EventTag::Confirmation).await;
            assert_eq!(progress.state, "srcSettling");

            h.source.confirm(&hash);
            let confirmed = wait_for(&mut sub, EventTag::Confirmed).await;
            assert_eq!(confirmed.state, "srcConfirmed");
            wait_for(&mut sub, EventTag::Accepted).await;
            let released = wait_for(&mut sub, EventTag::Released).await;
            assert_eq!(released.state, "destInitiated");

            let tx = released.burn_transaction().unwrap();
            assert_eq!(tx.ren_vm_hash, Some(format!("renvm-{hash}")));
            assert!(tx.dest_tx_hash.is_some());
            assert!(tx.completed_at.is_some());
        }
        .instrument(span)
        .await;

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, BurnState::DestInitiated);
        assert_eq!(h.source.burn_count(), 1);
        assert_eq!(h.dest.release_count(), 1);
    }

    #[tokio::test]
    async fn test_auto_submit_with_fees() {
        let mut h = Harness::burn();
        h.dest = Arc::new(InMemoryDestinationChain::new("Bitcoin").with_fees(FeeSchedule {
            lock: 0,
            release: 5_000,
            mint_bps: 0,
            burn_bps: 0,
        }));
        let mut sub = h.bus.subscribe(EventFilter::topics(vec![EventTopic::Burn]));
        let config = Harness::config().with_auto_submit(true).with_auto_fees(true);
        let handle = h.start_burn(burn_session("0.001"), config);

        let submitted = wait_for(&mut sub, EventTag::BurnSubmitted).await;
        assert_eq!(submitted.burn_transaction().unwrap().source_tx_amount, 105_000);

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, BurnState::SrcSettling);
        assert_eq!(outcome.session.suggested_amount, Some(105_000));
    }

    /// Dest chains without a synchronous hash still finish the burn.
    #[tokio::test]
    async fn test_release_without_dest_hash() {
        let mut h = Harness::burn();
        h.dest = Arc::new(InMemoryDestinationChain::new("Bitcoin").without_release_tx());
        let mut sub = h.subscribe();
        let handle = h.start_burn(
            burn_session("0.001"),
            Harness::config().with_auto_submit(true),
        );

        let hash = wait_for(&mut sub, EventTag::BurnSubmitted)
            .await
            .source_tx_hash
            .unwrap();
        h.source.confirm(&hash);

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, BurnState::DestInitiated);
        let tx = outcome.session.transaction.unwrap();
        assert!(tx.dest_tx_hash.is_none());
        assert!(tx.ren_response.is_some());
    }

    #[tokio::test]
    async fn test_invalid_amount_then_retry() {
        let h = Harness::burn();
        let mut sub = h.subscribe();
        let handle = h.start_burn(burn_session("not-a-number"), Harness::config());

        let failed = wait_for(&mut sub, EventTag::CreateError).await;
        assert_eq!(failed.state, "createError");
        let error = failed.burn_session().unwrap().error.clone().unwrap();
        assert_eq!(error.kind, ErrorKind::Initialization);

        // Still invalid: fails again, never burns.
        handle.retry().unwrap();
        wait_for(&mut sub, EventTag::CreateError).await;
        assert_eq!(h.source.burn_count(), 0);

        handle.stop().unwrap();
        assert_eq!(handle.join().await.unwrap().state, BurnState::CreateError);
    }

    #[tokio::test]
    async fn test_confirmation_failure_then_retry() {
        let h = Harness::burn();
        let mut sub = h.subscribe();
        let handle = h.start_burn(
            burn_session("0.001"),
            Harness::config().with_auto_submit(true),
        );

        let hash = wait_for(&mut sub, EventTag::BurnSubmitted)
            .await
            .source_tx_hash
            .unwrap();
        h.source.fail_confirmations(true);
        let failed = wait_for(&mut sub, EventTag::BurnError).await;
        assert_eq!(failed.state, "errorBurning");
        assert_eq!(
            failed.burn_session().unwrap().error.as_ref().unwrap().kind,
            ErrorKind::Confirmation
        );

        h.source.fail_confirmations(false);
        h.source.confirm(&hash);
        handle.retry().unwrap();
        wait_for(&mut sub, EventTag::Released).await;

        // Retry resumed monitoring; it did not burn again.
        assert_eq!(h.source.burn_count(), 1);
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_burn_from_registry_needs_both_chains() {
        let h = Harness::burn();
        let registry = ChainRegistry::new();
        registry.register_destination(h.dest.clone());

        let result = BurnOrchestrator::from_registry(
            burn_session("0.001"),
            &registry,
            h.bus.clone(),
            Harness::config(),
        );
        assert!(matches!(result, Err(OrchestratorError::UnsupportedChain(name)) if name == "Ethereum"));

        registry.register_source(h.source.clone());
        let mut sub = h.subscribe();
        let handle = BurnOrchestrator::from_registry(
            burn_session("0.001"),
            &registry,
            h.bus.clone(),
            Harness::config(),
        )
        .unwrap()
        .spawn();
        wait_for(&mut sub, EventTag::BurnCreated).await;
        handle.stop().unwrap();
        assert_eq!(handle.join().await.unwrap().state, BurnState::Created);
    }
}
