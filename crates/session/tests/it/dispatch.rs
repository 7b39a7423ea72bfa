use crate::utils::*;
use alloy_primitives::{Bytes, U256};
use fastpath_session::{
    CallScope, DispatchOptions, FallbackReason, KeyType, ProviderError, RequiredPermissions,
    Scope, TransactionCall, signer::sign_digest,
};
use serde_json::json;

fn scope(targets: &[CallScope]) -> Scope {
    Scope { call_scope: targets.to_vec(), spend_scope: vec![] }
}

fn call_to_a() -> (Vec<TransactionCall>, RequiredPermissions) {
    let calls = vec![TransactionCall::new(TARGET_A).with_value(U256::from(1))];
    let required = RequiredPermissions::from_calls(&calls);
    (calls, required)
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_a_fast_path() {
    let h = Harness::new();
    let public_key = h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::target(TARGET_A)]));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.success, "{result:?}");
    assert!(result.used_session_key);
    assert_eq!(result.key_id.as_deref(), Some("0xkey"));
    assert_eq!(result.transaction_id.as_deref(), Some("0xfast"));

    assert_eq!(h.wallet.count("wallet_prepareCalls"), 1);
    assert_eq!(h.wallet.count("wallet_sendPreparedCalls"), 1);
    assert_eq!(h.wallet.count("wallet_sendCalls"), 0);

    let prepare = &h.wallet.requests("wallet_prepareCalls")[0][0];
    assert_eq!(prepare["chainId"], "0xaa39db");
    assert_eq!(prepare["atomicRequired"], true);
    assert_eq!(prepare["from"], json!(ACCOUNT));
    assert_eq!(prepare["key"], json!({ "publicKey": public_key, "type": "p256" }));
    similar_asserts::assert_eq!(prepare["calls"], json!(calls));

    let send = &h.wallet.requests("wallet_sendPreparedCalls")[0][0];
    assert_eq!(send["context"], json!({ "quote": "opaque" }));
    assert!(send.get("digest").is_none());
    let signature: Bytes = serde_json::from_value(send["signature"].clone()).unwrap();
    let private_key = fastpath_session::KeyStore::get(&*h.store, &public_key).unwrap().unwrap();
    assert_eq!(signature, sign_digest(KeyType::P256, &private_key, DIGEST.as_slice()).unwrap());
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_b_permission_denied() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::target(TARGET_A)]));
    let calls = vec![TransactionCall::new(TARGET_B)];
    let required = RequiredPermissions::from_calls(&calls);

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.success);
    assert!(!result.used_session_key);
    assert_eq!(result.key_id, None);
    assert_eq!(result.transaction_id.as_deref(), Some("0xslow"));
    assert_eq!(h.wallet.count("wallet_sendPreparedCalls"), 0);
    assert_eq!(h.wallet.count("wallet_sendCalls"), 1);

    let reason = h.dispatcher.try_session_key(&calls, &required, true).await.unwrap_err();
    assert!(matches!(reason, FallbackReason::PermissionDenied { key_id } if key_id == "0xkey"));
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_c_expired_key() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW - 1, scope(&[CallScope::any()]));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.success);
    assert!(!result.used_session_key);
    assert_eq!(h.wallet.count("wallet_prepareCalls"), 0);
    assert_eq!(h.wallet.count("wallet_sendCalls"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_d_submit_failure_falls_back() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::target(TARGET_A)]));
    h.wallet.push("wallet_sendPreparedCalls", Err(ProviderError::rpc(-32000, "relay unavailable")));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.success);
    assert!(!result.used_session_key);
    assert_eq!(result.transaction_id.as_deref(), Some("0xslow"));
    assert_eq!(h.wallet.count("wallet_sendPreparedCalls"), 1);
    assert_eq!(h.wallet.count("wallet_sendCalls"), 1);

    // the slow path outcome is what the caller sees
    h.wallet.push("wallet_sendPreparedCalls", Err(ProviderError::Timeout));
    h.wallet.push("wallet_sendCalls", Err(ProviderError::rpc(-32603, "internal error")));
    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(!result.success);
    assert!(!result.used_session_key);
    assert_eq!(result.error_code, Some(-32603));
    assert!(!result.is_user_rejected());
}

#[tokio::test(flavor = "multi_thread")]
async fn preference_off_always_uses_wallet() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::any()]));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, false).await;
    assert!(result.success);
    assert!(!result.used_session_key);
    assert_eq!(h.wallet.count("wallet_getPermissions"), 0);
    assert_eq!(h.wallet.count("wallet_prepareCalls"), 0);
    assert_eq!(h.wallet.count("wallet_sendCalls"), 1);

    let sent = &h.wallet.requests("wallet_sendCalls")[0][0];
    assert_eq!(sent["version"], "1");
    assert_eq!(sent["calls"], json!(calls));
}

#[tokio::test(flavor = "multi_thread")]
async fn grant_fetch_failure_fails_closed() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::any()]));
    h.wallet.push("wallet_getPermissions", Err(ProviderError::Transport("offline".into())));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.success);
    assert!(!result.used_session_key);
    assert_eq!(h.wallet.count("wallet_prepareCalls"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_key_without_local_material_is_unusable() {
    let h = Harness::new();
    h.add_grant(grant("0xremote", "0x1234", KeyType::P256, NOW + 3600, scope(&[CallScope::any()])));
    let (calls, required) = call_to_a();

    let reason = h.dispatcher.try_session_key(&calls, &required, true).await.unwrap_err();
    assert!(matches!(reason, FallbackReason::NoUsableKey));
}

#[tokio::test(flavor = "multi_thread")]
async fn prefers_latest_expiring_local_key() {
    let h = Harness::new();
    h.granted_key("0xsoon", NOW + 60, scope(&[CallScope::any()]));
    h.granted_key("0xlater", NOW + 7200, scope(&[CallScope::any()]));
    h.add_grant(grant("0xremote", "0x1234", KeyType::P256, NOW + 9999, scope(&[CallScope::any()])));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.used_session_key);
    assert_eq!(result.key_id.as_deref(), Some("0xlater"));
}

#[tokio::test(flavor = "multi_thread")]
async fn user_rejection_is_preserved() {
    let h = Harness::new();
    h.wallet.push("wallet_sendCalls", Err(ProviderError::rpc(4001, "User rejected the request.")));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(!result.success);
    assert!(result.is_user_rejected());
    assert_eq!(result.error_code, Some(4001));
    assert!(result.error.unwrap().contains("User rejected"));
}

#[tokio::test(flavor = "multi_thread")]
async fn selector_restrictions_are_enforced() {
    let h = Harness::new();
    h.granted_key(
        "0xkey",
        NOW + 3600,
        scope(&[CallScope { target: Some(TARGET_A), selector: Some("transfer(address,uint256)".into()) }]),
    );
    let approve = vec![TransactionCall::new(TARGET_A).with_data(vec![0x09, 0x5e, 0xa7, 0xb3])];
    let required = RequiredPermissions::from_calls(&approve);

    let reason = h.dispatcher.try_session_key(&approve, &required, true).await.unwrap_err();
    assert!(matches!(reason, FallbackReason::SelectorDenied { .. }));

    let transfer = vec![TransactionCall::new(TARGET_A).with_data(vec![0xa9, 0x05, 0x9c, 0xbb])];
    let result = h.dispatcher.execute(&transfer, &required, true).await;
    assert!(result.used_session_key);
}

#[tokio::test(flavor = "multi_thread")]
async fn selector_checks_can_be_disabled() {
    let h = Harness::with_options(DispatchOptions {
        account: Some(ACCOUNT),
        chain_id: Some(1),
        enforce_selectors: false,
    });
    h.granted_key(
        "0xkey",
        NOW + 3600,
        scope(&[CallScope { target: Some(TARGET_A), selector: Some("0xa9059cbb".into()) }]),
    );
    let approve = vec![TransactionCall::new(TARGET_A).with_data(vec![0x09, 0x5e, 0xa7, 0xb3])];
    let required = RequiredPermissions::from_calls(&approve);

    let result = h.dispatcher.execute(&approve, &required, true).await;
    assert!(result.used_session_key);
    assert_eq!(h.wallet.count("eth_chainId"), 0);
    assert_eq!(h.wallet.requests("wallet_prepareCalls")[0][0]["chainId"], "0x1");
}

#[tokio::test(flavor = "multi_thread")]
async fn expiry_is_rederived_per_dispatch() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 10, scope(&[CallScope::any()]));
    let (calls, required) = call_to_a();

    assert!(h.dispatcher.execute(&calls, &required, true).await.used_session_key);
    h.clock.advance(10);
    assert!(!h.dispatcher.execute(&calls, &required, true).await.used_session_key);
}

#[tokio::test(flavor = "multi_thread")]
async fn secp256k1_keys_sign_with_alloy() {
    let h = Harness::new();
    let (public_key, private_key) = local_key(&h.store, KeyType::Secp256k1);
    h.add_grant(grant("0xk1", &public_key, KeyType::Secp256k1, NOW + 60, scope(&[CallScope::any()])));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.used_session_key);
    let send = &h.wallet.requests("wallet_sendPreparedCalls")[0][0];
    let signature: Bytes = serde_json::from_value(send["signature"].clone()).unwrap();
    assert_eq!(signature, sign_digest(KeyType::Secp256k1, &private_key, DIGEST.as_slice()).unwrap());
    assert_eq!(h.wallet.requests("wallet_prepareCalls")[0][0]["key"]["type"], "secp256k1");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_sibling_grant_keeps_fast_path() {
    let h = Harness::new();
    h.granted_key("0xkey", NOW + 3600, scope(&[CallScope::target(TARGET_A)]));
    h.add_raw_grant(json!({
        "id": "0xother",
        "key": { "publicKey": ACCOUNT, "type": "address" },
        "expiry": NOW + 3600,
        "permissions": { "calls": [{ "to": TARGET_A }] },
    }));
    let (calls, required) = call_to_a();

    let result = h.dispatcher.execute(&calls, &required, true).await;
    assert!(result.used_session_key, "{result:?}");
    assert_eq!(result.key_id.as_deref(), Some("0xkey"));
    assert_eq!(h.wallet.count("wallet_sendCalls"), 0);
}
