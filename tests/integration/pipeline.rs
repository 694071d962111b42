//! Cycle-level scenarios: one scan, the gate, and acquisition.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use sniper::engine::evaluator::Evaluator;
use sniper::engine::executor::Executor;
use sniper::engine::scanner::Scanner;
use sniper::engine::scheduler::Pipeline;
use sniper::ledger::LedgerGateway;
use sniper::strategy::FirstTrustLineBalance;
use sniper::types::LSF_DISALLOW_XRP;

use crate::mock_ledger::{IssuerFixture, MockLedger, MockSigner};

const THRESHOLD: Decimal = Decimal::from_parts(5000, 0, 0, false, 0);

pub fn build_pipeline(
    ledger: Arc<MockLedger>,
    signer: Arc<MockSigner>,
    dry_run: bool,
    max_concurrent: usize,
) -> Pipeline {
    let gateway: Arc<dyn LedgerGateway> = ledger;
    Pipeline::new(
        Scanner::new(Arc::clone(&gateway), 200),
        Evaluator::new(Arc::clone(&gateway), Arc::new(FirstTrustLineBalance), THRESHOLD),
        Executor::new(gateway, signer, dec!(1), dry_run),
        max_concurrent,
    )
}

#[tokio::test]
async fn test_eligible_token_is_acquired() {
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", IssuerFixture::healthy("ABC")));
    let signer = MockSigner::new();
    let pipeline = build_pipeline(ledger.clone(), signer.clone(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.candidates_scanned, 1);
    assert_eq!(report.acquired, vec!["HASH-rX".to_string()]);
    assert_eq!(report.failed, 0);
    assert!(report.is_settled());
    assert_eq!(
        ledger.commands_for("rX"),
        vec!["account_info", "book_offers", "account_lines", "autofill", "submit"]
    );
    assert_eq!(signer.signed.load(Ordering::SeqCst), 1);

    let tx = &ledger.autofilled()[0];
    assert_eq!(tx["TransactionType"], "Payment");
    assert_eq!(tx["Account"], "rSniperBot");
    assert_eq!(tx["Destination"], "rX");
    assert_eq!(tx["Amount"], "1000000");
    assert_eq!(tx["SendMax"], json!({"currency": "ABC", "issuer": "rX", "value": "1"}));
}

#[tokio::test]
async fn test_issuer_in_own_book_blocks_acquisition() {
    let mut fixture = IssuerFixture::healthy("ABC");
    fixture.offers.push(("rX".into(), "1".into()));
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", fixture));
    let signer = MockSigner::new();
    let pipeline = build_pipeline(ledger.clone(), signer.clone(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.rejected_liquidity, 1);
    assert!(report.acquired.is_empty());
    assert_eq!(ledger.commands_for("rX"), vec!["account_info", "book_offers"]);
    assert_eq!(ledger.count("account_lines"), 0);
    assert_eq!(signer.signed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_enabled_master_key_stops_at_first_stage() {
    let mut fixture = IssuerFixture::healthy("ABC");
    fixture.flags = 0;
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", fixture));
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.rejected_issuer_control, 1);
    assert_eq!(ledger.count("account_info"), 1);
    assert_eq!(ledger.count("book_offers"), 0);
    assert_eq!(ledger.count("account_lines"), 0);
}

#[tokio::test]
async fn test_regular_key_stops_at_first_stage() {
    let mut fixture = IssuerFixture::healthy("ABC");
    fixture.regular_key = Some("rDelegate".into());
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", fixture));
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.rejected_issuer_control, 1);
    assert_eq!(ledger.commands_for("rX"), vec!["account_info"]);
}

#[tokio::test]
async fn test_cap_at_threshold_is_rejected() {
    let mut fixture = IssuerFixture::healthy("ABC");
    fixture.lines = vec![("ABC".into(), "5000".into())];
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", fixture));
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.rejected_market_cap, 1);
    assert_eq!(ledger.count("autofill"), 0);
}

#[tokio::test]
async fn test_missing_trust_line_counts_as_zero_cap() {
    let mut fixture = IssuerFixture::healthy("ABC");
    fixture.lines = vec![("XYZ".into(), "999999".into())];
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", fixture));
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.acquired.len(), 1);
}

#[tokio::test]
async fn test_rpc_error_is_isolated_to_its_candidate() {
    let mut broken = IssuerFixture::healthy("BAD");
    broken.fail_on = Some("book_offers");
    let ledger = Arc::new(
        MockLedger::new()
            .with_issuer("rA", IssuerFixture::healthy("AAA"))
            .with_issuer("rBroken", broken)
            .with_issuer("rC", IssuerFixture::healthy("CCC")),
    );
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(3).await;

    assert!(!report.scan_failed);
    assert_eq!(report.cycle_number, 3);
    assert_eq!(report.candidates_scanned, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.acquired.len(), 2);
    assert!(report.acquired.contains(&"HASH-rA".to_string()));
    assert!(report.acquired.contains(&"HASH-rC".to_string()));
    assert!(report.is_settled());
    assert_eq!(ledger.commands_for("rBroken"), vec!["account_info", "book_offers"]);
}

#[tokio::test]
async fn test_scan_failure_settles_empty_cycle() {
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", IssuerFixture::healthy("ABC")));
    ledger.fail_scan("noNetwork");
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), false, 8);

    let report = pipeline.run_cycle(1).await;

    assert!(report.scan_failed);
    assert_eq!(report.candidates_scanned, 0);
    assert_eq!(ledger.calls().len(), 1);
}

#[tokio::test]
async fn test_dry_run_never_submits() {
    let ledger = Arc::new(MockLedger::new().with_issuer("rX", IssuerFixture::healthy("ABC")));
    let signer = MockSigner::new();
    let pipeline = build_pipeline(ledger.clone(), signer.clone(), true, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.dry_run_matches, 1);
    assert!(report.acquired.is_empty());
    assert_eq!(ledger.count("autofill"), 0);
    assert_eq!(ledger.count("submit"), 0);
    assert_eq!(signer.signed.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unflagged_entries_are_not_candidates() {
    let ledger = Arc::new(
        MockLedger::new()
            .with_issuer("rX", IssuerFixture::healthy("ABC"))
            .with_state_entry(json!({"Account": "rQuiet", "Flags": 0, "currency": "QQQ"}))
            .with_state_entry(json!({"Account": "rNoCurrency", "Flags": LSF_DISALLOW_XRP})),
    );
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), true, 8);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.candidates_scanned, 1);
    assert!(ledger.commands_for("rQuiet").is_empty());
    assert!(ledger.commands_for("rNoCurrency").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fan_out_respects_concurrency_bound() {
    let mut ledger = MockLedger::new().with_delay(Duration::from_millis(50));
    for i in 0..10 {
        ledger = ledger.with_issuer(&format!("rIssuer{i}"), IssuerFixture::healthy("TOK"));
    }
    let ledger = Arc::new(ledger);
    let pipeline = build_pipeline(ledger.clone(), MockSigner::new(), true, 3);

    let report = pipeline.run_cycle(1).await;

    assert_eq!(report.dry_run_matches, 10);
    assert_eq!(ledger.peak_in_flight(), 3);
}
