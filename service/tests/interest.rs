//! Interest accrual endpoint integration tests.

mod common;

use common::TestHarness;
use serde_json::Value;

use fundsflow_store::Store;

#[tokio::test]
async fn accrue_credits_user_accounts() {
    let harness = TestHarness::new();
    let charlie = harness.open_account("Charlie", 75_000);
    let empty = harness.open_account("NewUser", 0);

    let response = harness.server.post("/v1/interest/accrue").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["summary"]["accounts_scanned"], 2);
    assert_eq!(body["summary"]["accounts_credited"], 1);
    assert_eq!(body["summary"]["accounts_skipped"], 1);
    assert_eq!(body["summary"]["total_interest"], 56);
    assert_eq!(harness.balance(charlie), 75_056);
    assert_eq!(harness.balance(empty), 0);
    assert_eq!(
        harness.balance(harness.config.system_accounts.interest_expense),
        -56
    );
}

#[tokio::test]
async fn accrue_twice_same_day_is_a_no_op() {
    let harness = TestHarness::new();
    let charlie = harness.open_account("Charlie", 75_000);

    harness
        .server
        .post("/v1/interest/accrue")
        .await
        .assert_status_ok();
    let body: Value = harness.server.post("/v1/interest/accrue").await.json();

    assert_eq!(body["summary"]["accounts_credited"], 0);
    assert_eq!(body["summary"]["already_accrued"], 1);
    assert_eq!(harness.balance(charlie), 75_056);
}

#[tokio::test]
async fn accrual_entries_reference_the_run() {
    let harness = TestHarness::new();
    let alice = harness.open_account("Alice", 100_000);

    let body: Value = harness.server.post("/v1/interest/accrue").await.json();
    let run_id: uuid::Uuid = body["summary"]["run_id"].as_str().unwrap().parse().unwrap();

    let entries = harness
        .store
        .list_ledger_entries_by_reference(&run_id)
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(fundsflow_core::ledger::net_amount(&entries), 0);
    assert_eq!(harness.balance(alice), 100_075);
}
