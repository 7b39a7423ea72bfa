//! Scripted wallet connector.

use alloy_primitives::{Address, B256, address};
use async_trait::async_trait;
use fastpath_session::{
    DispatchOptions, Dispatcher, FixedClock, KeyRef, KeyStore, KeyType, MemoryKeyStore,
    PermissionGrant, PrivateKey, ProviderError, Scope, SessionKeyResolver, WalletClient,
    WalletProvider,
    signer::generate_key,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

pub const NOW: u64 = 1_750_000_000;
pub const ACCOUNT: Address = address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8");
pub const TARGET_A: Address = address!("0xaAaAaAaaAaAaAaaAaAAAAAAAAaaaAaAaAaaAaaAa");
pub const TARGET_B: Address = address!("0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB");
pub const DIGEST: B256 = B256::repeat_byte(0x42);

type Reply = Result<Value, ProviderError>;

/// A [`WalletProvider`] answering each method from a queue, falling back to a default reply.
#[derive(Clone, Default)]
pub struct MockWallet {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<Reply>>,
    defaults: HashMap<String, Value>,
    requests: Vec<(String, Value)>,
}

impl MockWallet {
    /// A wallet with successful default replies for every dispatch method.
    pub fn new() -> Self {
        let wallet = Self::default();
        wallet.set_default("eth_chainId", json!("0xaa39db"));
        wallet.set_default(
            "wallet_prepareCalls",
            json!({ "digest": DIGEST, "context": { "quote": "opaque" }, "capabilities": {} }),
        );
        wallet.set_default("wallet_sendPreparedCalls", json!([{ "id": "0xfast" }]));
        wallet.set_default("wallet_sendCalls", json!({ "id": "0xslow" }));
        wallet.set_default("wallet_getPermissions", json!([]));
        wallet.set_default("wallet_revokePermissions", Value::Null);
        wallet
    }

    pub fn set_default(&self, method: &str, value: Value) {
        self.inner.lock().defaults.insert(method.to_string(), value);
    }

    /// Queues a one-shot reply for `method`.
    pub fn push(&self, method: &str, reply: Reply) {
        self.inner.lock().queued.entry(method.to_string()).or_default().push_back(reply);
    }

    pub fn set_grants(&self, grants: &[PermissionGrant]) {
        self.set_default("wallet_getPermissions", serde_json::to_value(grants).unwrap());
    }

    /// Params of every request to `method`, in order.
    pub fn requests(&self, method: &str) -> Vec<Value> {
        self.inner
            .lock()
            .requests
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests(method).len()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut state = self.inner.lock();
        state.requests.push((method.to_string(), params));
        if let Some(reply) = state.queued.get_mut(method).and_then(VecDeque::pop_front) {
            return reply;
        }
        state
            .defaults
            .get(method)
            .cloned()
            .ok_or_else(|| ProviderError::rpc(-32601, format!("method {method} not found")))
    }
}

/// A grant record as the wallet reports it.
pub fn grant(id: &str, public_key: &str, key_type: KeyType, expiry: u64, scope: Scope) -> PermissionGrant {
    PermissionGrant {
        id: Some(id.to_string()),
        address: Some(ACCOUNT),
        key: Some(KeyRef { public_key: public_key.to_string(), key_type }),
        expiry,
        permissions: scope,
    }
}

/// Generates a key of `key_type` and stores its material in `store`.
pub fn local_key(store: &MemoryKeyStore, key_type: KeyType) -> (String, PrivateKey) {
    let key = generate_key(key_type).unwrap();
    store.put(&key.public_key, key.private_key).unwrap();
    (key.public_key, key.private_key)
}

pub type TestDispatcher = Dispatcher<MockWallet, Arc<MemoryKeyStore>, FixedClock>;

pub struct Harness {
    pub wallet: MockWallet,
    pub store: Arc<MemoryKeyStore>,
    pub clock: FixedClock,
    pub dispatcher: TestDispatcher,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(DispatchOptions {
            account: Some(ACCOUNT),
            chain_id: None,
            enforce_selectors: true,
        })
    }

    pub fn with_options(options: DispatchOptions) -> Self {
        crate::init_tracing();
        let wallet = MockWallet::new();
        let store = Arc::new(MemoryKeyStore::new());
        let clock = FixedClock::new(NOW);
        let resolver = SessionKeyResolver::with_clock(store.clone(), clock.clone());
        let dispatcher = Dispatcher::new(WalletClient::new(wallet.clone()), resolver, options);
        Self { wallet, store, clock, dispatcher }
    }

    /// Stores a fresh p256 key locally and grants it `scope` until `expiry`.
    pub fn granted_key(&self, id: &str, expiry: u64, scope: Scope) -> String {
        let (public_key, _) = local_key(&self.store, KeyType::P256);
        self.add_grant(grant(id, &public_key, KeyType::P256, expiry, scope));
        public_key
    }

    pub fn add_grant(&self, grant: PermissionGrant) {
        self.add_raw_grant(serde_json::to_value(grant).unwrap());
    }

    /// Appends a grant record verbatim, whether or not it is well formed.
    pub fn add_raw_grant(&self, grant: Value) {
        let mut inner = self.wallet.inner.lock();
        let grants = inner.defaults.entry("wallet_getPermissions".to_string()).or_insert(json!([]));
        grants.as_array_mut().unwrap().push(grant);
    }
}
