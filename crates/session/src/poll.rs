//! Bounded polling of call bundle status.

use crate::{
    error::{PollError, ProviderError},
    provider::WalletProvider,
    wallet::{CallsStatus, WalletClient},
};
use fastpath_config::PollConfig;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Repeats a request until it yields a value, at most `max_attempts` times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for Poller {
    fn from(config: &PollConfig) -> Self {
        Self::new(config.interval(), config.max_attempts)
    }
}

impl Poller {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }

    /// Calls `poll` with the attempt number until it returns `Some`.
    ///
    /// The first attempt runs immediately and later ones wait `interval`. Provider errors end
    /// polling. Cancellation is observed while waiting and while a request is in flight.
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, mut poll: F) -> Result<T, PollError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, ProviderError>>,
    {
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(PollError::Cancelled),
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
            let res = tokio::select! {
                _ = cancel.cancelled() => return Err(PollError::Cancelled),
                res = poll(attempt) => res?,
            };
            if let Some(value) = res {
                return Ok(value);
            }
            trace!(target: "fastpath::poll", attempt, max_attempts = self.max_attempts, "still pending");
        }
        Err(PollError::Exhausted { attempts: self.max_attempts })
    }

    /// Polls `wallet_getCallsStatus` until the bundle `id` leaves the pending state.
    pub async fn wait_for_calls_status<P: WalletProvider>(
        &self,
        wallet: &WalletClient<P>,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<CallsStatus, PollError> {
        self.run(cancel, move |_| async move {
            let status = wallet.get_calls_status(id).await?;
            Ok((!status.is_pending()).then_some(status))
        })
        .await
    }
}
