//! Session keys, scopes and call batches.

use alloy_primitives::{Address, Bytes, Selector, U256, hex, keccak256};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Signature scheme of a session key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    #[serde(rename = "p256")]
    P256,
    #[serde(rename = "secp256k1")]
    Secp256k1,
    #[serde(rename = "webauthn-p256")]
    WebAuthnP256,
}

impl KeyType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::P256 => "p256",
            Self::Secp256k1 => "secp256k1",
            Self::WebAuthnP256 => "webauthn-p256",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "p256" => Ok(Self::P256),
            "secp256k1" => Ok(Self::Secp256k1),
            "webauthn-p256" | "webauthn" => Ok(Self::WebAuthnP256),
            other => Err(format!("unknown key type `{other}`")),
        }
    }
}

/// Rolling period of a spend limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(format!("unknown spend period `{other}`")),
        }
    }
}

/// One entry of a key's call scope.
///
/// A missing `target` is a wildcard. The selector is kept in the form the wallet reported
/// it, which is either a 4-byte hex selector or a function signature.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallScope {
    #[serde(rename = "to", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Address>,
    #[serde(rename = "signature", alias = "selector", default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

impl CallScope {
    /// An entry allowing every call.
    pub const fn any() -> Self {
        Self { target: None, selector: None }
    }

    /// An entry allowing every function of `target`.
    pub const fn target(target: Address) -> Self {
        Self { target: Some(target), selector: None }
    }

    /// Returns `true` if the entry has no target restriction.
    pub const fn is_wildcard(&self) -> bool {
        self.target.is_none()
    }

    /// Returns `true` if the entry restricts the called function.
    pub const fn restricts_selector(&self) -> bool {
        self.selector.is_some()
    }

    /// Resolves the restricted selector.
    ///
    /// Returns `None` if the entry is unrestricted or the selector cannot be parsed.
    pub fn selector(&self) -> Option<Selector> {
        self.selector.as_deref().and_then(parse_selector)
    }
}

/// Parses a `0x`-prefixed 4-byte selector, or hashes a function signature into one.
pub fn parse_selector(s: &str) -> Option<Selector> {
    let s = s.trim();
    if s.contains('(') {
        let hash = keccak256(s.as_bytes());
        return Some(Selector::from_slice(&hash[..4]));
    }
    let bytes = hex::decode(s).ok()?;
    (bytes.len() == 4).then(|| Selector::from_slice(&bytes))
}

/// One entry of a key's spend scope. A missing `token` is the native currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    pub limit: U256,
    pub period: Period,
}

impl SpendScope {
    /// Returns `true` if the entry refers to the native currency.
    pub fn is_native(&self) -> bool {
        self.token.is_none_or(|token| token.is_zero())
    }
}

/// Call and spend permissions of a session key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "calls", default)]
    pub call_scope: Vec<CallScope>,
    #[serde(rename = "spend", default)]
    pub spend_scope: Vec<SpendScope>,
}

/// A session key as seen by this process: the authoritative grant joined with local state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    pub id: String,
    pub public_key: String,
    pub key_type: KeyType,
    /// Unix timestamp in seconds; the key is usable while `now < expiry`.
    pub expiry: u64,
    pub scope: Scope,
    pub has_local_private_key: bool,
}

impl SessionKey {
    /// Builds a key from the `index`-th authoritative grant.
    ///
    /// Returns `None` if the grant does not carry a public key.
    pub fn from_grant(grant: &PermissionGrant, index: usize, has_local_private_key: bool) -> Option<Self> {
        let key = grant.key.as_ref()?;
        let public_key = normalize_public_key(&key.public_key);
        if public_key.is_empty() {
            return None;
        }
        Some(Self {
            id: grant.id.clone().unwrap_or_else(|| format!("key-{index}")),
            public_key,
            key_type: key.key_type,
            expiry: grant.expiry,
            scope: grant.permissions.clone(),
            has_local_private_key,
        })
    }

    /// Returns `true` if the key has not expired at `now`.
    pub const fn is_active(&self, now: u64) -> bool {
        now < self.expiry
    }

    /// Returns `true` if the key can sign at `now`.
    pub const fn is_usable(&self, now: u64) -> bool {
        self.has_local_private_key && self.is_active(now)
    }
}

/// Public key reference as sent to and received from the wallet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRef {
    #[serde(default)]
    pub public_key: String,
    #[serde(rename = "type", default)]
    pub key_type: KeyType,
}

/// An authoritative permission grant, as returned by `wallet_getPermissions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyRef>,
    #[serde(default, with = "u64_or_hex")]
    pub expiry: u64,
    #[serde(default)]
    pub permissions: Scope,
}

impl PermissionGrant {
    /// Normalized public key of the granted key, if any.
    pub fn public_key(&self) -> Option<String> {
        self.key
            .as_ref()
            .map(|key| normalize_public_key(&key.public_key))
            .filter(|key| !key.is_empty())
    }
}

/// One call of an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionCall {
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

impl TransactionCall {
    pub const fn new(to: Address) -> Self {
        Self { to, data: None, value: None }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub const fn with_value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    /// The 4-byte function selector of the calldata, if present.
    pub fn selector(&self) -> Option<Selector> {
        self.data.as_ref().filter(|data| data.len() >= 4).map(|data| Selector::from_slice(&data[..4]))
    }
}

/// The minimal scope a dispatch needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequiredPermissions {
    /// Call targets that must be covered by the key's call scope.
    pub calls: Vec<Address>,
    /// Tokens the batch spends, used for the advisory spend limit lookup.
    pub tokens: Option<Vec<Address>>,
}

impl RequiredPermissions {
    pub fn new(calls: impl IntoIterator<Item = Address>) -> Self {
        Self { calls: calls.into_iter().collect(), tokens: None }
    }

    /// Requires every target of `calls`.
    pub fn from_calls(calls: &[TransactionCall]) -> Self {
        Self::new(calls.iter().map(|call| call.to))
    }

    pub fn with_tokens(mut self, tokens: impl IntoIterator<Item = Address>) -> Self {
        self.tokens = Some(tokens.into_iter().collect());
        self
    }
}

/// Normalizes a hex public key to lowercase with a `0x` prefix.
///
/// Local material is looked up by this form, so it must match the authoritative grant's
/// public key byte for byte.
pub fn normalize_public_key(public_key: &str) -> String {
    let trimmed = public_key.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", digits.to_ascii_lowercase())
}

/// Accepts integers as JSON numbers or as hex/decimal strings.
pub(crate) mod u64_or_hex {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    pub(crate) fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(*value)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match NumOrStr::deserialize(deserializer)? {
            NumOrStr::Num(n) => Ok(n),
            NumOrStr::Str(s) => match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16).map_err(D::Error::custom),
                None => s.parse().map_err(D::Error::custom),
            },
        }
    }
}
