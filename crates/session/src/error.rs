//! Error types.

use alloy_transport::TransportError;
use serde_json::Value;
use std::io;

/// EIP-1193 code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Error returned by a [`WalletProvider`](crate::WalletProvider) round-trip.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The wallet answered with a JSON-RPC error object.
    #[error("{message} (code {code})")]
    Rpc { code: i64, message: String, data: Option<Value> },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    /// The response did not have the expected shape.
    #[error("unexpected response to `{method}`: {source}")]
    Deserialize {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc { code, message: message.into(), data: None }
    }

    /// The JSON-RPC error code, if the wallet returned one.
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` if the wallet's authorization prompt was dismissed or declined.
    pub fn is_user_rejected(&self) -> bool {
        match self {
            Self::Rpc { code, .. } => *code == USER_REJECTED_CODE,
            Self::Transport(message) => is_rejection_message(message),
            _ => false,
        }
    }
}

/// Matches the phrases connectors use when they report a declined prompt without a code.
pub(crate) fn is_rejection_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["user rejected", "user denied", "user cancelled", "user canceled"]
        .iter()
        .any(|phrase| message.contains(phrase))
}

impl From<TransportError> for ProviderError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
                data: payload.data.as_ref().and_then(|data| serde_json::from_str(data.get()).ok()),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("failed to access key material at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed key material for {public_key}: {source}")]
    Json {
        public_key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid public key `{0}`: expected 0x-prefixed hex")]
    InvalidPublicKey(String),
    #[error("invalid private key for {0}")]
    InvalidPrivateKey(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("digest must be 32 bytes, got {0}")]
    MalformedDigest(usize),
    #[error("{0} keys cannot be signed with locally held material")]
    UnsupportedKeyType(crate::KeyType),
    #[error("invalid private key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Ecdsa(#[from] p256::ecdsa::Error),
    #[error(transparent)]
    Signer(#[from] alloy_signer::Error),
}

/// Failure of a fast-path attempt. Recovered by falling back to the slow path.
#[derive(Debug, thiserror::Error)]
pub enum FastPathError {
    #[error("no local key material for {0}")]
    MissingKeyMaterial(String),
    #[error("failed to sign digest: {0}")]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Transport(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] KeyStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("no permission grant with id `{0}`")]
    UnknownKey(String),
    #[error("invalid grant configuration: {0}")]
    InvalidGrant(String),
    #[error("failed to generate key: {0}")]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] KeyStoreError),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("polling was cancelled")]
    Cancelled,
    #[error("no final status after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error(transparent)]
    Provider(#[from] ProviderError),
}
