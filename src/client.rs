//! Client entry point: account handle, lazily loaded deployment state and
//! the gateway queue-handle cache.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use starknet::accounts::ConnectedAccount;
use starknet::core::chain_id;
use starknet::core::types::Felt;
use starknet::providers::Provider;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::Chain;
use crate::contract::SwitchboardContract;
use crate::error::SwitchboardError;
use crate::gateway::QueueHandle;
use crate::wire::Uint256;

/// Attempts before a state load gives up.
pub const STATE_FETCH_ATTEMPTS: u32 = 3;

/// How long a cached gateway queue handle stays fresh.
pub const QUEUE_HANDLE_TTL: Duration = Duration::from_secs(5 * 60);

/// Resolved deployment state for the connected network.
#[derive(Clone, Debug)]
pub struct State {
    pub switchboard_address: Felt,
    pub oracle_queue: Uint256,
    pub guardian_queue: Uint256,
    pub mainnet: bool,
}

/// Per-call replacements for individual state fields.
#[derive(Clone, Debug, Default)]
pub struct StateOverrides {
    pub switchboard_address: Option<Felt>,
    pub oracle_queue: Option<Uint256>,
    pub guardian_queue: Option<Uint256>,
}

impl StateOverrides {
    fn apply(&self, mut state: State) -> State {
        if let Some(address) = self.switchboard_address {
            state.switchboard_address = address;
        }
        if let Some(queue) = self.oracle_queue {
            state.oracle_queue = queue;
        }
        if let Some(queue) = self.guardian_queue {
            state.guardian_queue = queue;
        }
        state
    }
}

/// Run a fallible async operation up to `attempts` times, no backoff.
pub(crate) async fn with_retries<T, F, Fut>(
    attempts: u32,
    operation: F,
) -> Result<T, SwitchboardError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, SwitchboardError>>,
{
    for attempt in 1..=attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => debug!(attempt, %e, "state load attempt failed"),
        }
    }
    Err(SwitchboardError::StateFetchFailed { attempts })
}

pub(crate) struct QueueCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Arc<QueueHandle>)>>,
}

impl QueueCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// At most one load per key per TTL window: the map lock is held across
    /// the load, so concurrent callers wait for the first fetch instead of
    /// racing it.
    pub(crate) async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        load: F,
    ) -> Result<Arc<QueueHandle>, SwitchboardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<QueueHandle, SwitchboardError>>,
    {
        let mut entries = self.entries.lock().await;
        if let Some((loaded_at, handle)) = entries.get(key) {
            if loaded_at.elapsed() < self.ttl {
                return Ok(handle.clone());
            }
        }
        let handle = Arc::new(load().await?);
        entries.insert(key.to_string(), (Instant::now(), handle.clone()));
        Ok(handle)
    }
}

/// Handle on the Switchboard deployment through a connected account.
pub struct SwitchboardClient<A> {
    account: A,
    state: OnceCell<State>,
    queue_cache: QueueCache,
}

impl<A: ConnectedAccount + Sync> SwitchboardClient<A> {
    pub fn new(account: A) -> Self {
        Self {
            account,
            state: OnceCell::new(),
            queue_cache: QueueCache::new(QUEUE_HANDLE_TTL),
        }
    }

    pub fn account(&self) -> &A {
        &self.account
    }

    pub fn provider(&self) -> &A::Provider {
        self.account.provider()
    }

    async fn load_state(&self) -> Result<State, SwitchboardError> {
        let chain_id = self.provider().chain_id().await?;
        let mainnet = chain_id == chain_id::MAINNET;
        let chain = if mainnet {
            Chain::mainnet()
        } else {
            Chain::testnet()
        };
        debug!(mainnet, "loaded switchboard state");
        Ok(State {
            switchboard_address: chain.switchboard(),
            oracle_queue: chain.oracle_queue(),
            guardian_queue: chain.guardian_queue(),
            mainnet,
        })
    }

    /// Resolved deployment state, loaded once and cached for the lifetime of
    /// the client. The load is retried up to [`STATE_FETCH_ATTEMPTS`] times.
    pub async fn fetch_state(&self) -> Result<State, SwitchboardError> {
        self.state
            .get_or_try_init(|| with_retries(STATE_FETCH_ATTEMPTS, || self.load_state()))
            .await
            .cloned()
    }

    /// Like [`fetch_state`](Self::fetch_state), with per-call field
    /// overrides applied on top of the cached base state.
    pub async fn fetch_state_with(
        &self,
        overrides: &StateOverrides,
    ) -> Result<State, SwitchboardError> {
        Ok(overrides.apply(self.fetch_state().await?))
    }

    pub fn contract(&self, state: &State) -> SwitchboardContract<'_, A> {
        SwitchboardContract::new(state.switchboard_address, &self.account)
    }

    /// Gateway handle for the state's oracle queue, cached per queue id for
    /// [`QUEUE_HANDLE_TTL`]. An explicit gateway URL bypasses the cache.
    pub async fn queue_handle(
        &self,
        state: &State,
        gateway_override: Option<Url>,
    ) -> Result<Arc<QueueHandle>, SwitchboardError> {
        let queue_id = state.oracle_queue;
        if let Some(url) = gateway_override {
            return Ok(Arc::new(QueueHandle::connect(queue_id, url).await?));
        }
        let chain = if state.mainnet {
            Chain::mainnet()
        } else {
            Chain::testnet()
        };
        let default_gateway = chain.default_gateway().to_string();
        let key = queue_id.to_padded_hex();
        self.queue_cache
            .get_or_load(&key, move || async move {
                let url = Url::parse(&default_gateway)?;
                QueueHandle::connect(queue_id, url).await
            })
            .await
    }
}
