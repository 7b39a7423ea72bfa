//! The wallet connector boundary.

use crate::error::ProviderError;
use alloy_provider::{Provider, RootProvider};
use async_trait::async_trait;
use serde_json::Value;
use std::{borrow::Cow, sync::Arc};
use url::Url;

/// A JSON-RPC request interface to a smart-account wallet.
///
/// Any connector shape is adapted to this trait once, at the boundary.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[async_trait]
impl<T: WalletProvider + ?Sized> WalletProvider for Arc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        (**self).request(method, params).await
    }
}

#[async_trait]
impl<T: WalletProvider + ?Sized> WalletProvider for &T {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        (**self).request(method, params).await
    }
}

/// [`WalletProvider`] over an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct RpcWalletProvider<P = RootProvider> {
    provider: P,
}

impl RpcWalletProvider {
    /// Connects to the wallet connector at `url` over HTTP.
    pub fn new_http(url: Url) -> Self {
        Self::new(RootProvider::new_http(url))
    }
}

impl<P: Provider> RpcWalletProvider<P> {
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider> WalletProvider for RpcWalletProvider<P> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        trace!(target: "fastpath::provider", method, "sending request");
        let res = self
            .provider
            .raw_request::<Value, Value>(Cow::Owned(method.to_string()), params)
            .await?;
        Ok(res)
    }
}
