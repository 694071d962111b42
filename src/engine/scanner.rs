//! Ledger scanner.
//!
//! Pulls one page of the latest validated ledger state and turns the
//! entries flagged `lsfDisallowXRP` into candidate tokens.
//!
//! Currency derivation: a flagged entry's issuer is its `Account` field and
//! its currency is `Balance.currency` when `Balance` is an issued amount,
//! else a top-level `currency` field. `AccountRoot` entries carry neither,
//! so on live data this may yield few candidates; the rule is kept as the
//! literal reading of the filter rather than replaced by a trust-line index.

use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::{models, LedgerGateway};
use crate::types::{Candidate, SniperError, LSF_DISALLOW_XRP};

pub struct Scanner {
    gateway: Arc<dyn LedgerGateway>,
    page_size: u32,
}

impl Scanner {
    pub fn new(gateway: Arc<dyn LedgerGateway>, page_size: u32) -> Self {
        Self { gateway, page_size }
    }

    /// One `ledger_data` call against the validated ledger.
    ///
    /// Order follows the ledger snapshot. A gateway error aborts the scan.
    pub async fn scan(&self) -> Result<Vec<Candidate>, SniperError> {
        let result = self
            .gateway
            .request(
                "ledger_data",
                json!({
                    "ledger_index": "validated",
                    "limit": self.page_size,
                }),
            )
            .await?;

        let entries = models::ledger_state(result)?;
        let total = entries.len();

        let mut seen = HashSet::new();
        let mut flagged = 0usize;
        let mut candidates = Vec::new();

        for entry in &entries {
            if !is_flagged(entry) {
                continue;
            }
            flagged += 1;
            match extract_candidate(entry) {
                Some(candidate) => {
                    if seen.insert(candidate.clone()) {
                        candidates.push(candidate);
                    }
                }
                None => debug!(
                    index = entry.get("index").and_then(|v| v.as_str()).unwrap_or("?"),
                    "Flagged entry has no derivable currency"
                ),
            }
        }

        info!(
            entries = total,
            flagged,
            candidates = candidates.len(),
            "Ledger scan complete"
        );

        Ok(candidates)
    }
}

fn is_flagged(entry: &Value) -> bool {
    entry
        .get("Flags")
        .and_then(Value::as_u64)
        .map(|flags| flags & u64::from(LSF_DISALLOW_XRP) != 0)
        .unwrap_or(false)
}

fn extract_candidate(entry: &Value) -> Option<Candidate> {
    let issuer = entry.get("Account").and_then(Value::as_str)?;
    let currency = entry
        .pointer("/Balance/currency")
        .or_else(|| entry.get("currency"))
        .and_then(Value::as_str)?;
    if issuer.is_empty() || currency.is_empty() {
        return None;
    }
    Some(Candidate::new(issuer, currency))
}
