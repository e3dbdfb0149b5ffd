//! # Test Fixtures
//!
//! A bus, a pair of in-memory chains and helpers for waiting on session
//! events.

use rentx_bus::{EventFilter, EventTag, InMemorySessionBus, SessionEvent, Subscription};
use rentx_orchestrator::{
    BurnHandle, BurnOrchestrator, GatewayHandle, GatewayOrchestrator, InMemoryDestinationChain,
    InMemorySourceChain, OrchestratorConfig,
};
use rentx_types::{now_millis, BurnSession, GatewaySession, RenNetwork, TransferParams};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Upper bound for any single event to arrive.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Confirmation polling used by every test.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Bus plus the two chains of one direction.
pub struct Harness {
    pub bus: Arc<InMemorySessionBus>,
    pub source: Arc<InMemorySourceChain>,
    pub dest: Arc<InMemoryDestinationChain>,
}

impl Harness {
    /// Bitcoin to Ethereum.
    pub fn mint() -> Self {
        Self::new("Bitcoin", "Ethereum")
    }

    /// Ethereum back to Bitcoin.
    pub fn burn() -> Self {
        Self::new("Ethereum", "Bitcoin")
    }

    fn new(source: &str, dest: &str) -> Self {
        rentx_telemetry::init_test_logging();
        Self {
            bus: Arc::new(InMemorySessionBus::new()),
            source: Arc::new(InMemorySourceChain::new(source)),
            dest: Arc::new(InMemoryDestinationChain::new(dest)),
        }
    }

    /// Default configuration with fast polling.
    pub fn config() -> OrchestratorConfig {
        OrchestratorConfig::default().with_poll_interval(POLL_INTERVAL)
    }

    /// Every event, from now on.
    pub fn subscribe(&self) -> Subscription {
        self.bus.subscribe(EventFilter::all())
    }

    pub fn start_gateway(&self, session: GatewaySession, config: OrchestratorConfig) -> GatewayHandle {
        GatewayOrchestrator::new(
            session,
            self.source.clone(),
            self.dest.clone(),
            self.bus.clone(),
            config,
        )
        .expect("valid orchestrator config")
        .spawn()
    }

    pub fn start_burn(&self, session: BurnSession, config: OrchestratorConfig) -> BurnHandle {
        BurnOrchestrator::new(
            session,
            self.source.clone(),
            self.dest.clone(),
            self.bus.clone(),
            config,
        )
        .expect("valid orchestrator config")
        .spawn()
    }
}

fn params(source_chain: &str, dest_chain: &str, dest_address: &str, amount: &str) -> TransferParams {
    TransferParams {
        network: RenNetwork::Testnet,
        source_asset: "BTC".to_string(),
        source_chain: source_chain.to_string(),
        dest_chain: dest_chain.to_string(),
        dest_address: dest_address.to_string(),
        user_address: "0xuser".to_string(),
        target_amount: amount.to_string(),
    }
}

/// Mint session expiring in an hour.
pub fn mint_session(amount: &str) -> GatewaySession {
    mint_session_expiring(amount, Duration::from_secs(3600))
}

pub fn mint_session_expiring(amount: &str, ttl: Duration) -> GatewaySession {
    let expiry = now_millis() + ttl.as_millis() as u64;
    GatewaySession::new(params("Bitcoin", "Ethereum", "0xdest", amount), expiry)
}

pub fn burn_session(amount: &str) -> BurnSession {
    BurnSession::new(params("Ethereum", "Bitcoin", "tb1qdest", amount))
}

/// Next event with `tag`, skipping everything before it.
pub async fn wait_for(sub: &mut Subscription, tag: EventTag) -> SessionEvent {
    next_matching(sub, |event| event.tag == tag)
        .await
        .unwrap_or_else(|| panic!("no {tag:?} event"))
}

/// Next event with `tag` for the deposit `source_tx_hash`.
pub async fn wait_for_deposit(
    sub: &mut Subscription,
    tag: EventTag,
    source_tx_hash: &str,
) -> SessionEvent {
    next_matching(sub, |event| {
        event.tag == tag && event.source_tx_hash.as_deref() == Some(source_tx_hash)
    })
    .await
    .unwrap_or_else(|| panic!("no {tag:?} event for {source_tx_hash}"))
}

async fn next_matching<F>(sub: &mut Subscription, mut matches: F) -> Option<SessionEvent>
where
    F: FnMut(&SessionEvent) -> bool,
{
    timeout(EVENT_TIMEOUT, async {
        while let Some(event) = sub.recv().await {
            if matches(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Gateway address from any event carrying a mint snapshot.
pub fn gateway_address(event: &SessionEvent) -> String {
    event
        .gateway_session()
        .and_then(|session| session.gateway_address.clone())
        .unwrap_or_else(|| panic!("{:?} event has no gateway address", event.tag))
}

/// Poll `condition` until it holds or `EVENT_TIMEOUT` passes.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    timeout(EVENT_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}
