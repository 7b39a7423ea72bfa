//! Session key transaction dispatch.
//!
//! A batch is sent with a usable session key when one covers the request (fast path), and is
//! otherwise handed to the wallet's own authorization flow (slow path).

use crate::{
    error::{FastPathError, ProviderError},
    matcher::{calls_permitted, get_spend_limit, is_permitted},
    provider::WalletProvider,
    resolver::{AuthoritativeGrants, SessionKeyResolver},
    signer::sign_digest,
    store::KeyStore,
    time::{Clock, SystemClock},
    types::{KeyRef, RequiredPermissions, SessionKey, TransactionCall},
    wallet::WalletClient,
};
use alloy_primitives::Address;
use fastpath_config::Config;
use serde::Serialize;
use std::fmt;

/// Static dispatch settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Account whose grants are consulted and which submits the batch.
    pub account: Option<Address>,
    /// Chain id of prepared calls. Queried from the wallet when unset.
    pub chain_id: Option<u64>,
    /// Also require every call's selector to be covered by the key's scope.
    pub enforce_selectors: bool,
}

impl From<&Config> for DispatchOptions {
    fn from(config: &Config) -> Self {
        Self {
            account: config.account,
            chain_id: config.chain_id,
            enforce_selectors: config.enforce_selectors,
        }
    }
}

/// Outcome of [`Dispatcher::execute`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub used_session_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// JSON-RPC code of the terminal error, if the wallet returned one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
}

impl TransactionResult {
    fn fast_path(transaction_id: String, key_id: String) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            used_session_key: true,
            key_id: Some(key_id),
            ..Default::default()
        }
    }

    fn slow_path(result: Result<String, ProviderError>) -> Self {
        match result {
            Ok(id) => Self { success: true, transaction_id: Some(id), ..Default::default() },
            Err(err) => Self {
                success: false,
                error_code: err.code(),
                error: Some(err.to_string()),
                ..Default::default()
            },
        }
    }

    /// Returns `true` if the batch failed because the user declined the wallet prompt.
    pub fn is_user_rejected(&self) -> bool {
        if self.success {
            return false;
        }
        match self.error_code {
            Some(code) => code == crate::error::USER_REJECTED_CODE,
            None => self.error.as_deref().is_some_and(crate::error::is_rejection_message),
        }
    }
}

/// Why a dispatch did not complete on the fast path.
#[derive(Debug)]
pub enum FallbackReason {
    /// The caller asked for the slow path.
    Disabled,
    /// No key is both held locally and actively granted.
    NoUsableKey,
    /// The key's call scope does not cover a required target.
    PermissionDenied { key_id: String },
    /// The key's call scope does not cover a call's function selector.
    SelectorDenied { key_id: String },
    /// The fast path was attempted and failed.
    FastPath { key_id: String, error: FastPathError },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("session keys disabled"),
            Self::NoUsableKey => f.write_str("no usable session key"),
            Self::PermissionDenied { key_id } => {
                write!(f, "session key {key_id} does not cover the required targets")
            }
            Self::SelectorDenied { key_id } => {
                write!(f, "session key {key_id} does not cover the called functions")
            }
            Self::FastPath { key_id, error } => {
                write!(f, "session key {key_id} failed: {error}")
            }
        }
    }
}

/// Sends call batches through the fast path when possible, and the slow path otherwise.
#[derive(Debug)]
pub struct Dispatcher<P, S, C = SystemClock> {
    wallet: WalletClient<P>,
    resolver: SessionKeyResolver<S, C>,
    options: DispatchOptions,
}

impl<P: WalletProvider, S: KeyStore, C: Clock> Dispatcher<P, S, C> {
    pub fn new(
        wallet: WalletClient<P>,
        resolver: SessionKeyResolver<S, C>,
        options: DispatchOptions,
    ) -> Self {
        Self { wallet, resolver, options }
    }

    pub const fn wallet(&self) -> &WalletClient<P> {
        &self.wallet
    }

    pub const fn resolver(&self) -> &SessionKeyResolver<S, C> {
        &self.resolver
    }

    pub const fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Sends `calls` as one atomic batch.
    ///
    /// Never fails: an unusable key or a failed fast path falls back to the slow path, and a
    /// failed slow path is reported through [`TransactionResult::success`].
    pub async fn execute(
        &self,
        calls: &[TransactionCall],
        required: &RequiredPermissions,
        prefer_session_key: bool,
    ) -> TransactionResult {
        match self.try_session_key(calls, required, prefer_session_key).await {
            Ok(result) => result,
            Err(reason) => {
                match &reason {
                    FallbackReason::FastPath { .. } => {
                        warn!(target: "fastpath::dispatch", %reason, "falling back to the wallet")
                    }
                    _ => debug!(target: "fastpath::dispatch", %reason, "falling back to the wallet"),
                }
                self.execute_with_wallet(calls).await
            }
        }
    }

    /// Selects a usable key for the request and runs the fast path with it.
    pub async fn try_session_key(
        &self,
        calls: &[TransactionCall],
        required: &RequiredPermissions,
        prefer_session_key: bool,
    ) -> Result<TransactionResult, FallbackReason> {
        if !prefer_session_key {
            return Err(FallbackReason::Disabled);
        }

        let grants = AuthoritativeGrants::from(self.wallet.get_permissions(self.options.account).await);
        let key = self.resolver.usable_key(&grants).ok_or(FallbackReason::NoUsableKey)?;

        if !is_permitted(&key.scope, &required.calls) {
            return Err(FallbackReason::PermissionDenied { key_id: key.id });
        }
        if self.options.enforce_selectors && !calls_permitted(&key.scope, calls) {
            return Err(FallbackReason::SelectorDenied { key_id: key.id });
        }
        // Spend caps are enforced by the wallet.
        for &token in required.tokens.iter().flatten() {
            match get_spend_limit(&key.scope, Some(token)) {
                Some(limit) => {
                    trace!(target: "fastpath::dispatch", %token, limit = %limit.limit, period = ?limit.period, "spend limit")
                }
                None => debug!(target: "fastpath::dispatch", %token, key_id = %key.id, "no spend limit for token"),
            }
        }

        match self.execute_with_session_key(calls, &key).await {
            Ok(id) => {
                debug!(target: "fastpath::dispatch", key_id = %key.id, %id, "sent calls with session key");
                Ok(TransactionResult::fast_path(id, key.id))
            }
            Err(error) => Err(FallbackReason::FastPath { key_id: key.id, error }),
        }
    }

    /// Prepares `calls`, signs the digest with `key` and submits the signed intent.
    pub async fn execute_with_session_key(
        &self,
        calls: &[TransactionCall],
        key: &SessionKey,
    ) -> Result<String, FastPathError> {
        let private_key = self
            .resolver
            .store()
            .get(&key.public_key)?
            .ok_or_else(|| FastPathError::MissingKeyMaterial(key.public_key.clone()))?;

        let chain_id = match self.options.chain_id {
            Some(chain_id) => chain_id,
            None => self.wallet.chain_id().await?,
        };
        let key_ref = KeyRef { public_key: key.public_key.clone(), key_type: key.key_type };
        let prepared =
            self.wallet.prepare_calls(calls, chain_id, self.options.account, &key_ref).await?;
        let signature = sign_digest(key.key_type, &private_key, &prepared.digest)?;
        Ok(self.wallet.send_prepared_calls(prepared, &signature).await?)
    }

    /// Submits `calls` through the wallet's own authorization flow.
    pub async fn execute_with_wallet(&self, calls: &[TransactionCall]) -> TransactionResult {
        let result = self.wallet.send_calls(calls, self.options.account, self.options.chain_id).await;
        if let Err(err) = &result {
            if err.is_user_rejected() {
                debug!(target: "fastpath::dispatch", %err, "user rejected the wallet prompt");
            } else {
                warn!(target: "fastpath::dispatch", %err, "wallet failed to send calls");
            }
        }
        TransactionResult::slow_path(result)
    }
}
