//! Mock ledger for integration testing.
//!
//! Provides a deterministic `LedgerGateway` and `Signer` pair that serve
//! fixed issuer fixtures, record every call, and never touch the network.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sniper::ledger::{LedgerGateway, Signer};
use sniper::types::{SignedTransaction, SniperError, SubmitOutcome, LSF_DISABLE_MASTER, LSF_DISALLOW_XRP};

/// On-ledger setup for one issuer.
#[derive(Debug, Clone)]
pub struct IssuerFixture {
    pub currency: String,
    pub flags: u32,
    pub regular_key: Option<String>,
    /// (counterparty, offered value)
    pub offers: Vec<(String, String)>,
    /// (currency, balance)
    pub lines: Vec<(String, String)>,
    /// Command that fails for this issuer.
    pub fail_on: Option<&'static str>,
}

impl IssuerFixture {
    /// Blackholed issuer with some outside liquidity and a small cap.
    pub fn healthy(currency: &str) -> Self {
        Self {
            currency: currency.to_string(),
            flags: LSF_DISABLE_MASTER,
            regular_key: None,
            offers: vec![("rMaker1".into(), "300".into()), ("rMaker2".into(), "200".into())],
            lines: vec![(currency.to_string(), "1000".into())],
            fail_on: None,
        }
    }
}

/// One recorded gateway call: command plus the account it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub command: String,
    pub account: Option<String>,
}

pub struct MockLedger {
    issuers: Vec<(String, IssuerFixture)>,
    extra_state: Vec<Value>,
    scan_error: Mutex<Option<String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
    autofilled: Mutex<Vec<Value>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            issuers: Vec::new(),
            extra_state: Vec::new(),
            scan_error: Mutex::new(None),
            delay: None,
            calls: Mutex::new(Vec::new()),
            autofilled: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_issuer(mut self, issuer: &str, fixture: IssuerFixture) -> Self {
        self.issuers.push((issuer.to_string(), fixture));
        self
    }

    /// Add a raw state entry to the `ledger_data` snapshot.
    pub fn with_state_entry(mut self, entry: Value) -> Self {
        self.extra_state.push(entry);
        self
    }

    /// Delay every call by `delay` (tokio time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_scan(&self, message: &str) {
        *self.scan_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands issued for one account, in order.
    pub fn commands_for(&self, account: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.account.as_deref() == Some(account))
            .map(|c| c.command)
            .collect()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.command == command).count()
    }

    pub fn autofilled(&self) -> Vec<Value> {
        self.autofilled.lock().unwrap().clone()
    }

    /// Highest number of per-candidate requests seen at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, command: &str, account: Option<&str>) {
        self.calls.lock().unwrap().push(Call {
            command: command.to_string(),
            account: account.map(str::to_string),
        });
    }

    fn fixture(&self, issuer: &str) -> Option<&IssuerFixture> {
        self.issuers.iter().find(|(i, _)| i == issuer).map(|(_, f)| f)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn snapshot(&self) -> Value {
        let mut state: Vec<Value> = self
            .issuers
            .iter()
            .map(|(issuer, f)| {
                json!({
                    "LedgerEntryType": "AccountRoot",
                    "Account": issuer,
                    "Flags": LSF_DISALLOW_XRP,
                    "currency": f.currency,
                })
            })
            .collect();
        state.extend(self.extra_state.iter().cloned());
        json!({ "ledger_index": 90_000_000u64, "state": state, "validated": true })
    }

    fn respond(&self, command: &str, issuer: &str) -> Result<Value, SniperError> {
        let fixture = self
            .fixture(issuer)
            .ok_or_else(|| SniperError::rpc(command, "actNotFound: Account not found."))?;

        if fixture.fail_on == Some(command) {
            return Err(SniperError::rpc(command, "tooBusy: The server is too busy"));
        }

        match command {
            "account_info" => {
                let mut data = json!({ "Account": issuer, "Flags": fixture.flags, "Balance": "50000000" });
                if let Some(key) = &fixture.regular_key {
                    data["RegularKey"] = json!(key);
                }
                Ok(json!({ "account_data": data, "validated": true }))
            }
            "book_offers" => {
                let offers: Vec<Value> = fixture
                    .offers
                    .iter()
                    .map(|(account, value)| {
                        json!({
                            "Account": account,
                            "TakerGets": { "currency": fixture.currency, "issuer": issuer, "value": value },
                            "TakerPays": "1000000",
                        })
                    })
                    .collect();
                Ok(json!({ "offers": offers }))
            }
            "account_lines" => {
                let lines: Vec<Value> = fixture
                    .lines
                    .iter()
                    .map(|(currency, balance)| {
                        json!({ "account": "rHolder", "currency": currency, "balance": balance, "limit": "0" })
                    })
                    .collect();
                Ok(json!({ "account": issuer, "lines": lines }))
            }
            other => Err(SniperError::rpc(other, "unknownCmd")),
        }
    }
}

#[async_trait]
impl LedgerGateway for MockLedger {
    async fn connect(&self) -> Result<(), SniperError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SniperError> {
        Ok(())
    }

    async fn request(&self, command: &str, params: Value) -> Result<Value, SniperError> {
        let account = params
            .get("account")
            .or_else(|| params.pointer("/taker_gets/issuer"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self.record(command, account.as_deref());

        if command == "ledger_data" {
            self.pause().await;
            if let Some(message) = self.scan_error.lock().unwrap().clone() {
                return Err(SniperError::rpc(command, message));
            }
            return Ok(self.snapshot());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        self.pause().await;
        let result = self.respond(command, account.as_deref().unwrap_or_default());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn autofill(&self, mut tx: Value) -> Result<Value, SniperError> {
        let destination = tx["Destination"].as_str().map(str::to_string);
        self.record("autofill", destination.as_deref());
        tx["Sequence"] = json!(42);
        tx["Fee"] = json!("12");
        tx["LastLedgerSequence"] = json!(90_000_020u64);
        self.autofilled.lock().unwrap().push(tx.clone());
        Ok(tx)
    }

    async fn submit_and_wait(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, SniperError> {
        let destination = signed.tx_blob.strip_prefix("SIGNED-");
        self.record("submit", destination);
        if signed.last_ledger_sequence.is_none() {
            return Err(SniperError::Transaction("no LastLedgerSequence".into()));
        }
        Ok(SubmitOutcome {
            hash: signed.hash.clone(),
            ledger_index: Some(90_000_001),
            engine_result: "tesSUCCESS".to_string(),
        })
    }
}

/// Signer that tags the blob with the destination so submissions can be
/// traced back to their candidate.
pub struct MockSigner {
    pub signed: AtomicUsize,
}

impl MockSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            signed: AtomicUsize::new(0),
        })
    }
}

impl Signer for MockSigner {
    fn address(&self) -> &str {
        "rSniperBot"
    }

    fn sign(&self, tx: &Value) -> Result<SignedTransaction, SniperError> {
        self.signed.fetch_add(1, Ordering::SeqCst);
        let destination = tx["Destination"].as_str().unwrap_or_default();
        Ok(SignedTransaction {
            tx_blob: format!("SIGNED-{destination}"),
            hash: format!("HASH-{destination}"),
            last_ledger_sequence: tx["LastLedgerSequence"].as_u64(),
        })
    }
}
