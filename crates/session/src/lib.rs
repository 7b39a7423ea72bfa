//! # fastpath-session
//!
//! Session key dispatch for smart-account wallets.
//!
//! A [`Dispatcher`] sends a batch of calls with a locally held session key when the wallet has
//! granted that key a scope covering the batch, and otherwise hands the batch to the wallet's
//! own authorization flow.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

pub mod error;
pub use error::{
    FastPathError, KeyStoreError, LifecycleError, PollError, ProviderError, SigningError,
};

pub mod types;
pub use types::{
    CallScope, KeyRef, KeyType, Period, PermissionGrant, RequiredPermissions, Scope, SessionKey,
    SpendScope, TransactionCall,
};

pub mod matcher;
pub use matcher::{SpendLimit, calls_permitted, get_spend_limit, is_permitted};

pub mod store;
pub use store::{FileKeyStore, KeyStore, MemoryKeyStore, PrivateKey};

mod time;
pub use time::{Clock, FixedClock, SystemClock};

pub mod resolver;
pub use resolver::{AuthoritativeGrants, SessionKeyResolver, get_usable_key};

pub mod provider;
pub use provider::{RpcWalletProvider, WalletProvider};

pub mod wallet;
pub use wallet::{CallsStatus, WalletClient};

pub mod signer;

pub mod dispatcher;
pub use dispatcher::{DispatchOptions, Dispatcher, FallbackReason, TransactionResult};

pub mod lifecycle;
pub use lifecycle::{CreateSessionKey, Lifecycle};

pub mod poll;
pub use poll::Poller;
