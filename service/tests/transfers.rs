//! Transfer, account and ledger endpoint integration tests.

mod common;

use axum::http::StatusCode;
use common::TestHarness;
use serde_json::{json, Value};

use fundsflow_core::AccountId;

async fn post_transfer(
    harness: &TestHarness,
    from: AccountId,
    to: AccountId,
    amount: i64,
    key: &str,
) -> axum_test::TestResponse {
    harness
        .server
        .post("/v1/transfers")
        .json(&json!({
            "from_user_id": from.to_string(),
            "to_user_id": to.to_string(),
            "amount": amount,
            "idempotency_key": key,
        }))
        .await
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn transfer_success() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);

    let response = post_transfer(&harness, alice, bob, 20_000, "k1").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Transfer successful");
    assert_eq!(body["transaction"]["status"], "COMPLETED");
    assert_eq!(body["transaction"]["amount"], 20_000);
    assert_eq!(body["transaction"]["idempotency_key"], "k1");
    assert!(body["transaction"].get("reverses").is_none());
    assert_eq!(harness.balance(alice), 80_000);
    assert_eq!(harness.balance(bob), 70_000);
}

#[tokio::test]
async fn transfer_replay_returns_same_log() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);

    let first: Value = post_transfer(&harness, alice, bob, 20_000, "k1").await.json();
    let second = post_transfer(&harness, alice, bob, 20_000, "k1").await;

    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(first["transaction"], second["transaction"]);
    assert_eq!(harness.balance(alice), 80_000);
    assert_eq!(harness.balance(bob), 70_000);
}

#[tokio::test]
async fn transfer_insufficient_funds() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);

    let entries_before = harness.store.ledger_entry_count();

    let response = post_transfer(&harness, alice, bob, 200_000, "k2").await;

    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_funds");
    assert_eq!(body["error"]["details"]["balance"], 100_000);
    assert_eq!(body["error"]["details"]["required"], 200_000);
    assert_eq!(harness.balance(alice), 100_000);
    assert_eq!(harness.balance(bob), 50_000);
    assert_eq!(harness.store.ledger_entry_count(), entries_before);

    harness
        .server
        .get("/v1/transfers/k2")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn transfer_validation_errors() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);

    for (from, to, amount) in [(alice, bob, 0), (alice, bob, -1), (alice, alice, 10)] {
        let response = post_transfer(&harness, from, to, amount, "bad").await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "validation_error");
    }
}

#[tokio::test]
async fn transfer_to_unknown_account() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);

    let response = post_transfer(&harness, alice, AccountId::generate(), 10, "ghost").await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "account_not_found");
}

#[tokio::test]
async fn transfer_lookup_and_entries() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);
    post_transfer(&harness, alice, bob, 20_000, "k1")
        .await
        .assert_status_ok();

    let log: Value = harness.server.get("/v1/transfers/k1").await.json();
    assert_eq!(log["status"], "COMPLETED");
    assert_eq!(log["from_user_id"], alice.to_string());

    let response = harness.server.get("/v1/transfers/k1/entries").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 4);
    let net: i64 = entries
        .iter()
        .map(|e| {
            let amount = e["amount"].as_i64().unwrap();
            if e["entry_type"] == "CREDIT" {
                amount
            } else {
                -amount
            }
        })
        .sum();
    assert_eq!(net, 0);

    let transaction_id = entries[0]["transaction_id"].as_str().unwrap();
    let ledger: Value = harness
        .server
        .get(&format!("/v1/ledger/{transaction_id}"))
        .await
        .json();
    assert_eq!(ledger["balanced"], true);
    assert_eq!(ledger["entries"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn unknown_ledger_transaction_is_not_found() {
    let harness = TestHarness::new();

    harness
        .server
        .get(&format!("/v1/ledger/{}", fundsflow_core::TransactionId::generate()))
        .await
        .assert_status_not_found();
    harness
        .server
        .get("/v1/ledger/not-a-ulid")
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Reversal
// ============================================================================

#[tokio::test]
async fn reversal_round_trip() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);
    let body: Value = post_transfer(&harness, alice, bob, 20_000, "k1").await.json();
    let log_id = body["transaction"]["id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .post(&format!("/v1/transfers/{log_id}/reversal"))
        .json(&json!({ "idempotency_key": "k1-undo" }))
        .await;
    response.assert_status_ok();
    assert_eq!(harness.balance(alice), 100_000);
    assert_eq!(harness.balance(bob), 50_000);

    let entries: Value = harness.server.get("/v1/transfers/k1/entries").await.json();
    assert!(entries["entries"]
        .as_array()
        .unwrap()
        .iter()
        .all(|e| e["status"] == "REVERSED"));

    let again = harness
        .server
        .post(&format!("/v1/transfers/{log_id}/reversal"))
        .json(&json!({ "idempotency_key": "k1-undo-again" }))
        .await;
    again.assert_status(StatusCode::CONFLICT);
    let body: Value = again.json();
    assert_eq!(body["error"]["code"], "invalid_status_transition");
}

#[tokio::test]
async fn reversal_of_a_reversal_is_rejected() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);
    let bob = harness.open_account("Bob", 50_000);
    let body: Value = post_transfer(&harness, alice, bob, 100, "t").await.json();
    let log_id = body["transaction"]["id"].as_str().unwrap().to_string();

    let response = harness
        .server
        .post(&format!("/v1/transfers/{log_id}/reversal"))
        .json(&json!({ "idempotency_key": "r" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["message"], "Transfer reversed");
    assert_eq!(body["transaction"]["reverses"], log_id.as_str());
    let reversal_id = body["transaction"]["id"].as_str().unwrap().to_string();
    let entries_before = harness.store.ledger_entry_count();

    let again = harness
        .server
        .post(&format!("/v1/transfers/{reversal_id}/reversal"))
        .json(&json!({ "idempotency_key": "rr" }))
        .await;

    again.assert_status_bad_request();
    let body: Value = again.json();
    assert_eq!(body["error"]["code"], "validation_error");
    assert_eq!(harness.store.ledger_entry_count(), entries_before);
    assert_eq!(harness.balance(alice), 100_000);
    assert_eq!(harness.balance(bob), 50_000);
    harness
        .server
        .get("/v1/transfers/rr")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn reversal_of_unknown_transfer() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post(&format!(
            "/v1/transfers/{}/reversal",
            fundsflow_core::TransactionLogId::generate()
        ))
        .json(&json!({ "idempotency_key": "undo" }))
        .await;

    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "transfer_not_found");
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
async fn get_account_balance() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);

    let response = harness.server.get(&format!("/v1/accounts/{alice}")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["balance"], 100_000);
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["kind"], "user");
}

#[tokio::test]
async fn get_account_errors() {
    let harness = TestHarness::new();

    harness
        .server
        .get(&format!("/v1/accounts/{}", AccountId::generate()))
        .await
        .assert_status_not_found();

    let response = harness.server.get("/v1/accounts/not-a-uuid").await;
    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "validation_error");
}
