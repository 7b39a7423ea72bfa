//! Typed wallet connector requests.

use crate::{
    error::ProviderError,
    provider::WalletProvider,
    types::{KeyRef, PermissionGrant, Scope, TransactionCall},
};
use alloy_primitives::{Address, Bytes, U64};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Response of `wallet_prepareCalls`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PreparedCalls {
    /// The payload the session key must sign.
    pub digest: Bytes,
    /// Opaque fields echoed back to `wallet_sendPreparedCalls`.
    #[serde(flatten)]
    pub request: Map<String, Value>,
}

/// Response of `wallet_getCallsStatus`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallsStatus {
    pub status: u16,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl CallsStatus {
    pub const PENDING: u16 = 100;

    pub const fn is_pending(&self) -> bool {
        self.status == Self::PENDING
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

#[derive(Deserialize)]
struct CallsId {
    id: String,
}

// Wallets answer submissions either as `[{id}]`, `{id}` or a bare id.
#[derive(Deserialize)]
#[serde(untagged)]
enum SubmitResponse {
    Many(Vec<CallsId>),
    One(CallsId),
    Id(String),
}

impl SubmitResponse {
    fn into_id(self) -> Option<String> {
        match self {
            Self::Many(ids) => ids.into_iter().next().map(|c| c.id),
            Self::One(c) => Some(c.id),
            Self::Id(id) => Some(id),
        }
    }
}

/// Parameters of `wallet_grantPermissions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantPermissions {
    pub key: KeyRef,
    pub expiry: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_token: Option<FeeToken>,
    pub permissions: Scope,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeeToken {
    pub symbol: String,
    pub limit: String,
}

/// Wallet connector client with a per-request timeout.
#[derive(Clone, Debug)]
pub struct WalletClient<P> {
    provider: P,
    timeout: Duration,
}

impl<P: WalletProvider> WalletClient<P> {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub const fn new(provider: P) -> Self {
        Self { provider, timeout: Self::DEFAULT_TIMEOUT }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub const fn provider(&self) -> &P {
        &self.provider
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProviderError> {
        let res = tokio::time::timeout(self.timeout, self.provider.request(method, params))
            .await
            .map_err(|_| ProviderError::Timeout)??;
        serde_json::from_value(res)
            .map_err(|source| ProviderError::Deserialize { method: method.to_string(), source })
    }

    async fn submit(&self, method: &str, params: Value) -> Result<String, ProviderError> {
        let res: SubmitResponse = self.call(method, params).await?;
        res.into_id().ok_or_else(|| ProviderError::Transport(format!("`{method}` returned no call id")))
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let id: U64 = self.call("eth_chainId", json!([])).await?;
        Ok(id.to())
    }

    /// `wallet_prepareCalls`
    pub async fn prepare_calls(
        &self,
        calls: &[TransactionCall],
        chain_id: u64,
        from: Option<Address>,
        key: &KeyRef,
    ) -> Result<PreparedCalls, ProviderError> {
        let mut intent = json!({
            "calls": calls,
            "chainId": U64::from(chain_id),
            "atomicRequired": true,
            "key": key,
        });
        if let Some(from) = from {
            intent["from"] = json!(from);
        }
        self.call("wallet_prepareCalls", json!([intent])).await
    }

    /// `wallet_sendPreparedCalls`, returning the call bundle id.
    pub async fn send_prepared_calls(
        &self,
        prepared: PreparedCalls,
        signature: &Bytes,
    ) -> Result<String, ProviderError> {
        let mut request = prepared.request;
        request.insert("signature".to_string(), json!(signature));
        self.submit("wallet_sendPreparedCalls", json!([request])).await
    }

    /// `wallet_sendCalls`, returning the call bundle id.
    pub async fn send_calls(
        &self,
        calls: &[TransactionCall],
        from: Option<Address>,
        chain_id: Option<u64>,
    ) -> Result<String, ProviderError> {
        let mut params = json!({ "version": "1", "calls": calls });
        if let Some(from) = from {
            params["from"] = json!(from);
        }
        if let Some(chain_id) = chain_id {
            params["chainId"] = json!(U64::from(chain_id));
        }
        self.submit("wallet_sendCalls", json!([params])).await
    }

    /// `wallet_getPermissions`
    ///
    /// Records that do not parse as a [`PermissionGrant`] are skipped, the rest are kept.
    pub async fn get_permissions(
        &self,
        account: Option<Address>,
    ) -> Result<Vec<PermissionGrant>, ProviderError> {
        let params = match account {
            Some(address) => json!([{ "address": address }]),
            None => json!([{}]),
        };
        let grants: Vec<Value> = self.call("wallet_getPermissions", params).await?;
        Ok(parse_grants(grants))
    }

    /// `wallet_grantPermissions`, returning the new grant.
    pub async fn grant_permissions(
        &self,
        grant: &GrantPermissions,
    ) -> Result<PermissionGrant, ProviderError> {
        self.call("wallet_grantPermissions", json!([grant])).await
    }

    /// `wallet_revokePermissions`
    pub async fn revoke_permissions(&self, id: &str) -> Result<(), ProviderError> {
        let _: Value = self.call("wallet_revokePermissions", json!([{ "id": id }])).await?;
        Ok(())
    }

    /// `wallet_getCallsStatus`
    pub async fn get_calls_status(&self, id: &str) -> Result<CallsStatus, ProviderError> {
        self.call("wallet_getCallsStatus", json!([id])).await
    }
}

fn parse_grants(grants: Vec<Value>) -> Vec<PermissionGrant> {
    grants
        .into_iter()
        .enumerate()
        .filter_map(|(index, grant)| match serde_json::from_value(grant) {
            Ok(grant) => Some(grant),
            Err(err) => {
                debug!(target: "fastpath::wallet", index, %err, "skipping malformed permission grant");
                None
            }
        })
        .collect()
}
