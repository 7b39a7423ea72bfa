//! Default scope requested when a new session key is granted.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// The `[grant]` section.
///
/// ```toml
/// [grant]
/// calls = [{ to = "0x044b54e85D3ba9ae376Aeb00eBD09F21421f7f50", signature = "transfer(address,uint256)" }]
/// spend = [{ token = "0x044b54e85D3ba9ae376Aeb00eBD09F21421f7f50", limit = "50000000000000000000", period = "minute" }]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantConfig {
    /// Call targets the key may invoke.
    pub calls: Vec<CallGrant>,
    /// Spend caps per token and period.
    pub spend: Vec<SpendGrant>,
    /// Fee token allowance attached to the grant request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_token: Option<FeeTokenGrant>,
}

/// A call permission; a missing `to` allows any target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// A 4-byte selector or a function signature such as `approve(address,uint256)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A spend permission; a missing `token` refers to the native currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    pub limit: U256,
    pub period: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTokenGrant {
    pub symbol: String,
    pub limit: String,
}
