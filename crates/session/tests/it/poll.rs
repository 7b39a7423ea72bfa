use crate::utils::MockWallet;
use fastpath_session::{PollError, Poller, ProviderError, WalletClient};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(start_paused = true)]
async fn waits_until_not_pending() {
    let wallet = MockWallet::new();
    wallet.push("wallet_getCallsStatus", Ok(json!({ "status": 100 })));
    wallet.push("wallet_getCallsStatus", Ok(json!({ "status": 100 })));
    wallet.set_default(
        "wallet_getCallsStatus",
        json!({ "status": 200, "receipts": [{ "status": "0x1" }] }),
    );
    let client = WalletClient::new(wallet.clone());

    let started = tokio::time::Instant::now();
    let status = Poller::new(Duration::from_secs(5), 60)
        .wait_for_calls_status(&client, "0xbundle", &CancellationToken::new())
        .await
        .unwrap();
    assert!(status.is_success());
    assert!(status.rest.contains_key("receipts"));
    assert_eq!(wallet.count("wallet_getCallsStatus"), 3);
    assert_eq!(wallet.requests("wallet_getCallsStatus")[0], json!(["0xbundle"]));
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn bounded_by_max_attempts() {
    let wallet = MockWallet::new();
    wallet.set_default("wallet_getCallsStatus", json!({ "status": 100 }));
    let client = WalletClient::new(wallet.clone());

    let err = Poller::new(Duration::from_secs(5), 3)
        .wait_for_calls_status(&client, "0xbundle", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Exhausted { attempts: 3 }));
    assert_eq!(wallet.count("wallet_getCallsStatus"), 3);
}

#[tokio::test(start_paused = true)]
async fn final_failure_status_is_returned() {
    let wallet = MockWallet::new();
    wallet.set_default("wallet_getCallsStatus", json!({ "status": 500 }));
    let client = WalletClient::new(wallet);

    let status = Poller::default()
        .wait_for_calls_status(&client, "0xbundle", &CancellationToken::new())
        .await
        .unwrap();
    assert!(!status.is_pending());
    assert!(!status.is_success());
}

#[tokio::test(start_paused = true)]
async fn cancelled_by_caller() {
    let wallet = MockWallet::new();
    wallet.set_default("wallet_getCallsStatus", json!({ "status": 100 }));
    let client = WalletClient::new(wallet.clone());
    let cancel = CancellationToken::new();

    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            Poller::new(Duration::from_secs(5), 1_000)
                .wait_for_calls_status(&client, "0xbundle", &cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_secs(12)).await;
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, PollError::Cancelled));
    assert!(wallet.count("wallet_getCallsStatus") < 1_000);
}

#[tokio::test(start_paused = true)]
async fn provider_errors_stop_polling() {
    let wallet = MockWallet::new();
    wallet.push("wallet_getCallsStatus", Err(ProviderError::rpc(-32602, "unknown bundle")));
    let client = WalletClient::new(wallet.clone());

    let err = Poller::default()
        .wait_for_calls_status(&client, "0xbundle", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::Provider(ProviderError::Rpc { code: -32602, .. })));
    assert_eq!(wallet.count("wallet_getCallsStatus"), 1);
}
