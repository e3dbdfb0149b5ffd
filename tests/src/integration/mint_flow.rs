//! # Mint Flow
//!
//! Gateway creation, deposit detection, confirmations, signing, claim and
//! acknowledgement, driven through the public handle and observed on the bus.

#[cfg(test)]
mod tests {
    use crate::fixtures::{
        eventually, gateway_address, mint_session, mint_session_expiring, wait_for,
        wait_for_deposit, Harness,
    };
    use rentx_bus::EventTag;
    use rentx_orchestrator::{
        ChainRegistry, GatewayOrchestrator, GatewayState, InMemoryDestinationChain,
        InMemorySourceChain, MintSessionApi, OrchestratorConfig, OrchestratorError,
    };
    use rentx_types::{CustomParams, ErrorKind};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // HAPPY PATH
    // =========================================================================

    /// One deposit from detection to acknowledgement, claimed by hand.
    #[tokio::test]
    async fn test_deposit_end_to_end() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());

        let listening = wait_for(&mut sub, EventTag::Listening).await;
        assert_eq!(
            listening.gateway_session().unwrap().suggested_amount,
            Some(100_000)
        );
        let address = gateway_address(&listening);

        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        let detected = wait_for_deposit(&mut sub, EventTag::Deposit, "abc").await;
        assert_eq!(detected.deposit_state.as_deref(), Some("checkingCompletion"));
        assert_eq!(detected.deposit().unwrap().source_tx_amount, 100_000);

        let settling = wait_for_deposit(&mut sub, EventTag::DepositRestored, "abc").await;
        assert_eq!(settling.deposit_state.as_deref(), Some("srcSettling"));

        h.source.set_confirmations("abc", 2);
        let progress = wait_for_deposit(&mut sub, EventTag::Confirmation, "abc").await;
        let deposit = progress.deposit().unwrap();
        assert_eq!(deposit.source_tx_conf_target, Some(6));

        h.source.confirm("abc");
        wait_for_deposit(&mut sub, EventTag::Confirmed, "abc").await;
        let claimable = wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;
        assert_eq!(claimable.deposit_state.as_deref(), Some("accepted"));
        let signed = claimable.deposit().unwrap();
        assert_eq!(signed.ren_vm_hash.as_deref(), Some("renvm-abc"));
        assert!(signed.signature.is_some());

        let mut params = CustomParams::new();
        params.insert("referrer".to_string(), json!("0xref"));
        handle.claim("abc", params.clone()).unwrap();
        wait_for_deposit(&mut sub, EventTag::Claiming, "abc").await;
        let submitted = wait_for_deposit(&mut sub, EventTag::Submitted, "abc").await;
        let minted = h.dest.minted("abc").unwrap();
        assert_eq!(
            submitted.deposit().unwrap().dest_tx_hash.as_deref(),
            Some(minted.as_str())
        );
        assert_eq!(submitted.deposit().unwrap().contract_params, Some(params));
        wait_for_deposit(&mut sub, EventTag::DestConfirmed, "abc").await;

        handle.acknowledge("abc").unwrap();
        let completed = wait_for_deposit(&mut sub, EventTag::DepositCompleted, "abc").await;
        assert_eq!(completed.deposit_state.as_deref(), Some("completed"));
        assert!(completed.deposit().unwrap().completed_at.is_some());
        assert_eq!(completed.state, "listening");

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, GatewayState::Listening);
        assert_eq!(h.dest.mint_count(), 1);
    }

    /// With both policies on, a confirmed deposit completes on its own.
    #[tokio::test]
    async fn test_auto_claim_and_acknowledge() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let config = Harness::config()
            .with_auto_claim(true)
            .with_auto_acknowledge(true);
        let handle = h.start_gateway(mint_session("0.001"), config);

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");

        let completed = wait_for_deposit(&mut sub, EventTag::DepositCompleted, "abc").await;
        let deposit = completed.deposit().unwrap();
        assert_eq!(deposit.contract_params, Some(CustomParams::new()));
        assert!(deposit.dest_tx_hash.is_some());

        handle.stop().unwrap();
        handle.join().await.unwrap();
        assert_eq!(h.dest.mint_count(), 1);
    }

    /// Deposits progress independently of one another.
    #[tokio::test]
    async fn test_two_deposits_on_one_gateway() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let config = Harness::config().with_auto_claim(true);
        let handle = h.start_gateway(mint_session("0.001"), config);

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("first", 100_000));
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("second", 40_000));

        h.source.confirm("second");
        wait_for_deposit(&mut sub, EventTag::Submitted, "second").await;
        assert!(h.dest.minted("first").is_none());

        h.source.confirm("first");
        wait_for_deposit(&mut sub, EventTag::Submitted, "first").await;

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.session.transactions.len(), 2);
        assert_eq!(h.dest.mint_count(), 2);
    }

    /// A payload seen twice on chain is one deposit.
    #[tokio::test]
    async fn test_duplicate_detection_is_ignored() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        let raw = InMemorySourceChain::raw_deposit("abc", 100_000);
        h.source.push_deposit(&address, raw.clone());
        h.source.push_deposit(&address, raw);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("def", 1));
        wait_for_deposit(&mut sub, EventTag::Deposit, "def").await;

        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.session.transactions.len(), 2);
    }

    // =========================================================================
    // FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_reverted_deposit_is_final() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let config = Harness::config().with_auto_claim(true);
        let handle = h.start_gateway(mint_session("0.001"), config);
        h.dest.revert("abc", "invalid utxo");

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");

        let reverted = wait_for_deposit(&mut sub, EventTag::Reverted, "abc").await;
        assert_eq!(reverted.deposit_state.as_deref(), Some("reverted"));
        let error = reverted.deposit().unwrap().error.clone().unwrap();
        assert_eq!(error.kind, ErrorKind::SigningReverted);
        assert!(!error.kind.is_retriable());
        // The session shows the latest deposit failure too.
        let session_error = reverted.gateway_session().unwrap().error.clone();
        assert_eq!(session_error, Some(error));

        // The deposit has finished; retrying it does nothing.
        handle.retry_deposit("abc").unwrap();
        handle.claim("abc", CustomParams::new()).unwrap();
        handle.stop().unwrap();
        let outcome = handle.join().await.unwrap();
        assert!(outcome.session.transactions["abc"].dest_tx_hash.is_none());
        assert_eq!(h.dest.claim_attempts(), 0);
    }

    #[tokio::test]
    async fn test_transient_signing_failure_then_retry() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        h.dest.fail_next_signatures(1);

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");

        let failed = wait_for_deposit(&mut sub, EventTag::SignError, "abc").await;
        assert_eq!(failed.deposit_state.as_deref(), Some("errorAccepting"));
        assert_eq!(
            failed.deposit().unwrap().error.as_ref().unwrap().kind,
            ErrorKind::SigningTransient
        );

        handle.retry_deposit("abc").unwrap();
        wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;
        assert_eq!(h.dest.signature_requests(), 2);

        handle.stop().unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_claim_can_be_claimed_again() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        h.dest.fail_next_claims(1);

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");
        wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;

        handle.claim("abc", CustomParams::new()).unwrap();
        let failed = wait_for_deposit(&mut sub, EventTag::SubmitError, "abc").await;
        assert_eq!(failed.deposit_state.as_deref(), Some("errorSubmitting"));
        assert_eq!(
            failed.deposit().unwrap().error.as_ref().unwrap().kind,
            ErrorKind::Claim
        );

        handle.claim("abc", CustomParams::new()).unwrap();
        wait_for_deposit(&mut sub, EventTag::Submitted, "abc").await;
        assert_eq!(h.dest.claim_attempts(), 2);
        assert_eq!(h.dest.mint_count(), 1);

        handle.stop().unwrap();
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_deposit_is_never_minted() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        h.source
            .push_deposit(&address, InMemorySourceChain::raw_deposit("abc", 100_000));
        h.source.confirm("abc");
        wait_for_deposit(&mut sub, EventTag::Claimable, "abc").await;

        handle.reject("abc").unwrap();
        let rejected = wait_for_deposit(&mut sub, EventTag::Rejected, "abc").await;
        assert_eq!(rejected.deposit_state.as_deref(), Some("rejected"));

        handle.stop().unwrap();
        handle.join().await.unwrap();
        assert_eq!(h.dest.mint_count(), 0);
    }

    #[tokio::test]
    async fn test_watch_failure_is_initialize_error() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        h.source.fail_watch(true);
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());

        let failed = wait_for(&mut sub, EventTag::InitializeError).await;
        assert_eq!(failed.state, "srcInitializeError");
        let error = failed.gateway_session().unwrap().error.clone().unwrap();
        assert_eq!(error.kind, ErrorKind::Listening);

        h.source.fail_watch(false);
        handle.retry().unwrap();
        let listening = wait_for(&mut sub, EventTag::Listening).await;
        assert_eq!(listening.state, "listening");

        handle.stop().unwrap();
        handle.join().await.unwrap();
    }

    // =========================================================================
    // EXPIRY AND LIFECYCLE
    // =========================================================================

    #[tokio::test]
    async fn test_expiry_stops_listening() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let session = mint_session_expiring("0.001", Duration::from_millis(300));
        let handle = h.start_gateway(session, Harness::config());

        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        let expired = wait_for(&mut sub, EventTag::Expired).await;
        assert_eq!(expired.state, "completed");

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.state, GatewayState::Completed);
        assert!(eventually(|| h.source.watcher_count(&address) == 0).await);
    }

    #[tokio::test]
    async fn test_stop_ends_the_session() {
        let h = Harness::mint();
        let mut sub = h.subscribe();
        let handle = h.start_gateway(mint_session("0.001"), Harness::config());
        let address = gateway_address(&wait_for(&mut sub, EventTag::Listening).await);
        assert!(eventually(|| h.source.watcher_count(&address) == 1).await);

        handle.stop().unwrap();
        let stopped = wait_for(&mut sub, EventTag::Stopped).await;
        assert_eq!(stopped.session_id, handle.session_id());
        handle.join().await.unwrap();

        assert!(eventually(|| h.source.watcher_count(&address) == 0).await);
    }

    // =========================================================================
    // REGISTRY
    // =========================================================================

    #[tokio::test]
    async fn test_orchestrator_from_registry() {
        let h = Harness::mint();
        let registry = ChainRegistry::new();
        registry.register_source(h.source.clone());
        registry.register_destination(h.dest.clone());
        assert_eq!(registry.source_names(), vec!["bitcoin".to_string()]);

        let mut sub = h.subscribe();
        let handle = GatewayOrchestrator::from_registry(
            mint_session("0.001"),
            &registry,
            h.bus.clone(),
            Harness::config(),
        )
        .unwrap()
        .spawn();
        wait_for(&mut sub, EventTag::Listening).await;
        handle.stop().unwrap();
        handle.join().await.unwrap();

        let mut unknown = mint_session("0.001");
        unknown.params.dest_chain = "Solana".to_string();
        let result = GatewayOrchestrator::from_registry(
            unknown,
            &registry,
            h.bus.clone(),
            OrchestratorConfig::default(),
        );
        assert!(matches!(result, Err(OrchestratorError::UnsupportedChain(name)) if name == "Solana"));

        let zero_poll = OrchestratorConfig::default().with_poll_interval(Duration::ZERO);
        let result = GatewayOrchestrator::from_registry(
            mint_session("0.001"),
            &registry,
            h.bus.clone(),
            zero_poll,
        );
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[tokio::test]
    async fn test_registry_lookup_is_case_insensitive() {
        let registry = ChainRegistry::new();
        registry.register_destination(Arc::new(InMemoryDestinationChain::new("Ethereum")));
        assert!(registry.destination("ethereum").is_ok());
        assert!(registry.destination("ETHEREUM").is_ok());
        assert!(registry.source("ethereum").is_err());
    }
}
