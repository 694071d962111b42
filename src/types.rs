//! Shared types for the SNIPER agent.
//!
//! These types form the data model used across all modules.
//! They are kept free of I/O so that the ledger, strategy and engine
//! modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Ledger constants
// ---------------------------------------------------------------------------

/// `AccountRoot` flag: the master key pair is disabled.
pub const LSF_DISABLE_MASTER: u32 = 0x0010_0000;

/// Ledger-entry flag the scanner filters on (`lsfDisallowXRP`).
pub const LSF_DISALLOW_XRP: u32 = 0x0008_0000;

/// Drops per XRP.
pub const DROPS_PER_XRP: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A token discovered during one scan, identified by (issuer, currency).
///
/// Identity only holds for the cycle that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub issuer: String,
    pub currency: String,
}

impl Candidate {
    pub fn new(issuer: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.currency, self.issuer)
    }
}

// ---------------------------------------------------------------------------
// Ledger snapshots
// ---------------------------------------------------------------------------

/// Issuer control configuration, read from its `AccountRoot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub regular_key: Option<String>,
    pub master_disabled: bool,
}

impl AccountState {
    pub fn from_flags(flags: u32, regular_key: Option<String>) -> Self {
        Self {
            regular_key: regular_key.filter(|k| !k.is_empty()),
            master_disabled: flags & LSF_DISABLE_MASTER != 0,
        }
    }

    /// No regular key AND master key disabled. Either alone is not enough.
    pub fn is_blackholed(&self) -> bool {
        self.regular_key.is_none() && self.master_disabled
    }
}

/// A standing offer in the (token → XRP) book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookOffer {
    /// Account that placed the offer.
    pub account: String,
    /// Amount of the token on offer.
    pub size: Decimal,
}

/// A trust line as seen from the issuer's side.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustLine {
    pub currency: String,
    pub balance: Decimal,
}

// ---------------------------------------------------------------------------
// Acquisition transaction
// ---------------------------------------------------------------------------

/// Issued-currency amount in ledger JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedAmount {
    pub currency: String,
    pub issuer: String,
    pub value: String,
}

/// The payment used to acquire a token, in ledger JSON field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PaymentTx {
    pub transaction_type: String,
    pub account: String,
    pub destination: String,
    /// Native amount in drops.
    pub amount: String,
    pub send_max: IssuedAmount,
}

/// A transaction blob ready for submission.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub tx_blob: String,
    /// Hash of the signed blob, known before submission.
    pub hash: String,
    /// Last ledger the transaction can be included in.
    pub last_ledger_sequence: Option<u64>,
}

/// What the ledger said about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub hash: String,
    pub ledger_index: Option<u64>,
    pub engine_result: String,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The three gate stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    IssuerControl,
    Liquidity,
    MarketCap,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::IssuerControl => write!(f, "issuer-control"),
            Stage::Liquidity => write!(f, "liquidity"),
            Stage::MarketCap => write!(f, "market-cap"),
        }
    }
}

/// Gate decision. A rejection is a decision, not a fault.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Eligible,
    Rejected { stage: Stage, detail: String },
}

/// Result of running the gate on one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub candidate: Candidate,
    pub verdict: Verdict,
    /// Last stage that ran.
    pub decided_by: Stage,
}

impl Evaluation {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Eligible)
    }
}

/// End-to-end result of one candidate pipeline.
#[derive(Debug, Clone)]
pub enum CandidateOutcome {
    Acquired { candidate: Candidate, hash: String },
    WouldAcquire { candidate: Candidate, payment: PaymentTx },
    Rejected { candidate: Candidate, stage: Stage },
    Failed { candidate: Candidate, error: String },
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of a single scan → evaluate → acquire cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle_number: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub candidates_scanned: usize,
    pub rejected_issuer_control: usize,
    pub rejected_liquidity: usize,
    pub rejected_market_cap: usize,
    pub acquired: Vec<String>,
    pub dry_run_matches: usize,
    pub failed: usize,
    pub scan_failed: bool,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn new(cycle_number: u64) -> Self {
        Self {
            cycle_number,
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Fold one candidate outcome into the tallies.
    pub fn record(&mut self, outcome: &CandidateOutcome) {
        match outcome {
            CandidateOutcome::Acquired { hash, .. } => self.acquired.push(hash.clone()),
            CandidateOutcome::WouldAcquire { .. } => self.dry_run_matches += 1,
            CandidateOutcome::Rejected { stage, .. } => match stage {
                Stage::IssuerControl => self.rejected_issuer_control += 1,
                Stage::Liquidity => self.rejected_liquidity += 1,
                Stage::MarketCap => self.rejected_market_cap += 1,
            },
            CandidateOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected_issuer_control + self.rejected_liquidity + self.rejected_market_cap
    }

    /// Every scanned candidate reached a terminal outcome.
    pub fn is_settled(&self) -> bool {
        self.rejected() + self.acquired.len() + self.dry_run_matches + self.failed
            == self.candidates_scanned
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scan_failed {
            return write!(f, "Cycle #{}: scan failed", self.cycle_number);
        }
        write!(
            f,
            "Cycle #{}: scanned={} rejected={} acquired={} dry_run={} failed={} ({:.1}s)",
            self.cycle_number,
            self.candidates_scanned,
            self.rejected(),
            self.acquired.len(),
            self.dry_run_matches,
            self.failed,
            self.elapsed.as_secs_f64(),
        )
    }
}

// ---------------------------------------------------------------------------
// Amount helpers
// ---------------------------------------------------------------------------

/// Parse a ledger decimal string, accepting scientific notation ("1.5e3").
pub fn parse_value(raw: &str) -> Result<Decimal, SniperError> {
    let raw = raw.trim();
    let parsed = if raw.contains(['e', 'E']) {
        Decimal::from_scientific(raw)
    } else {
        Decimal::from_str(raw)
    };
    parsed.map_err(|e| SniperError::Decode(format!("invalid amount {raw:?}: {e}")))
}

/// Parse a ledger amount: a drops string for XRP or an issued-currency object.
pub fn parse_amount(amount: &serde_json::Value) -> Result<Decimal, SniperError> {
    match amount {
        serde_json::Value::String(drops) => Ok(parse_value(drops)? / DROPS_PER_XRP),
        serde_json::Value::Object(obj) => match obj.get("value").and_then(|v| v.as_str()) {
            Some(value) => parse_value(value),
            None => Err(SniperError::Decode("issued amount without value".into())),
        },
        other => Err(SniperError::Decode(format!("unexpected amount: {other}"))),
    }
}

/// Convert XRP to an integer drops string. Fails on sub-drop precision.
pub fn xrp_to_drops(xrp: Decimal) -> Result<String, SniperError> {
    let drops = xrp * DROPS_PER_XRP;
    if drops.fract() != Decimal::ZERO {
        return Err(SniperError::Transaction(format!(
            "{xrp} XRP is not a whole number of drops"
        )));
    }
    Ok(drops.trunc().normalize().to_string())
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SNIPER.
#[derive(Debug, thiserror::Error)]
pub enum SniperError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("RPC error ({command}): {message}")]
    Rpc { command: String, message: String },

    #[error("Malformed ledger data: {0}")]
    Decode(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SniperError {
    pub fn rpc(command: &str, message: impl Into<String>) -> Self {
        SniperError::Rpc {
            command: command.to_string(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
