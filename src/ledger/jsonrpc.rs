//! rippled JSON-RPC gateway.
//!
//! Talks to a single rippled node over HTTP. Every call is a POST of
//! `{"method": ..., "params": [ ... ]}`; the node answers with a `result`
//! object whose `status` is `"success"` or `"error"`.
//!
//! API docs: https://xrpl.org/docs/references/http-websocket-apis
//! Auth: none; only public methods are used.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::LedgerGateway;
use crate::types::{SignedTransaction, SniperError, SubmitOutcome};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ledgers a transaction may wait before it expires.
const LEDGER_OFFSET: u64 = 20;

/// Engine-result prefixes that can never succeed later.
const FINAL_REJECT_PREFIXES: &[&str] = &["tem", "tef", "tel"];

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: [Value; 1],
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// JSON-RPC implementation of [`LedgerGateway`].
pub struct JsonRpcGateway {
    http: Client,
    endpoint: String,
    poll_interval: Duration,
    max_fee_drops: u64,
}

impl JsonRpcGateway {
    /// Create a gateway for `endpoint`.
    ///
    /// `timeout` bounds every HTTP round-trip; `poll_interval` is the delay
    /// between validation checks in [`LedgerGateway::submit_and_wait`];
    /// autofill refuses network fees above `max_fee_drops`.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        poll_interval: Duration,
        max_fee_drops: u64,
    ) -> Result<Self, SniperError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("SNIPER/0.1.0 (xrpl-token-agent)")
            .build()
            .map_err(|e| SniperError::Connection(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            poll_interval,
            max_fee_drops,
        })
    }

    // -- Internal helpers ------------------------------------------------

    /// POST a command and return its `result` object without judging `status`.
    async fn call(&self, method: &str, params: Value) -> Result<Value, SniperError> {
        debug!(method, "Ledger RPC");

        let body = RpcRequest {
            method,
            params: [params],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| SniperError::rpc(method, format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SniperError::rpc(method, format!("HTTP {status}: {text}")));
        }

        let mut envelope: Value = resp
            .json()
            .await
            .map_err(|e| SniperError::rpc(method, format!("invalid JSON: {e}")))?;

        match envelope.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(SniperError::rpc(method, "response has no result")),
        }
    }

    async fn validated_ledger_index(&self) -> Result<u64, SniperError> {
        let result = self
            .request("ledger", json!({ "ledger_index": "validated" }))
            .await?;
        result
            .get("ledger_index")
            .and_then(as_u64)
            .ok_or_else(|| SniperError::rpc("ledger", "missing ledger_index"))
    }

    async fn current_ledger_index(&self) -> Result<u64, SniperError> {
        let result = self.request("ledger_current", json!({})).await?;
        result
            .get("ledger_current_index")
            .and_then(as_u64)
            .ok_or_else(|| SniperError::rpc("ledger_current", "missing ledger_current_index"))
    }

    async fn network_fee(&self) -> Result<u64, SniperError> {
        let result = self.request("fee", json!({})).await?;
        let drops = result
            .get("drops")
            .ok_or_else(|| SniperError::rpc("fee", "missing drops"))?;
        let base = drops.get("base_fee").and_then(as_u64).unwrap_or(10);
        let open = drops.get("open_ledger_fee").and_then(as_u64).unwrap_or(base);
        select_fee(base, open, self.max_fee_drops)
    }

    async fn next_sequence(&self, account: &str) -> Result<u64, SniperError> {
        let result = self
            .request(
                "account_info",
                json!({ "account": account, "ledger_index": "current" }),
            )
            .await?;
        result
            .pointer("/account_data/Sequence")
            .and_then(as_u64)
            .ok_or_else(|| SniperError::rpc("account_info", "missing Sequence"))
    }
}

/// rippled encodes some integers as JSON numbers and some as strings.
fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Open-ledger fee, never below the base fee and never above `max`.
fn select_fee(base: u64, open: u64, max: u64) -> Result<u64, SniperError> {
    let fee = open.max(base);
    if fee > max {
        return Err(SniperError::Transaction(format!(
            "network fee of {fee} drops exceeds the {max} drop cap"
        )));
    }
    Ok(fee)
}

/// Preliminary engine result of a `submit`, or an error when it can never
/// succeed later.
fn preliminary_result(hash: &str, submitted: &Value) -> Result<String, SniperError> {
    let engine_result = submitted
        .get("engine_result")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    if FINAL_REJECT_PREFIXES.iter().any(|p| engine_result.starts_with(p)) {
        let message = submitted
            .get("engine_result_message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(SniperError::Transaction(format!(
            "{hash} rejected on submit: {engine_result} {message}"
        )));
    }
    Ok(engine_result.to_string())
}

/// State of a submitted transaction as reported by `tx`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollState {
    Pending,
    Validated {
        result: String,
        ledger_index: Option<u64>,
    },
}

fn poll_state(status: &Value) -> PollState {
    if !status.get("validated").and_then(Value::as_bool).unwrap_or(false) {
        return PollState::Pending;
    }
    PollState::Validated {
        result: status
            .pointer("/meta/TransactionResult")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        ledger_index: status.get("ledger_index").and_then(as_u64),
    }
}

/// Turn an error-status `result` into a `SniperError::Rpc`.
fn check_status(command: &str, result: Value) -> Result<Value, SniperError> {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        let code = result.get("error").and_then(Value::as_str).unwrap_or("unknown");
        let message = result
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or(code);
        return Err(SniperError::rpc(command, format!("{code}: {message}")));
    }
    Ok(result)
}

#[async_trait]
impl LedgerGateway for JsonRpcGateway {
    async fn connect(&self) -> Result<(), SniperError> {
        let result = self
            .call("server_info", json!({}))
            .await
            .and_then(|r| check_status("server_info", r))
            .map_err(|e| SniperError::Connection(format!("{}: {e}", self.endpoint)))?;

        let state = result
            .pointer("/info/server_state")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let validated = result
            .pointer("/info/validated_ledger/seq")
            .and_then(as_u64);

        info!(endpoint = %self.endpoint, server_state = state, validated_ledger = ?validated, "Connected to ledger");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SniperError> {
        // HTTP is connectionless; nothing to tear down beyond the pool.
        info!(endpoint = %self.endpoint, "Disconnected from ledger");
        Ok(())
    }

    async fn request(&self, command: &str, params: Value) -> Result<Value, SniperError> {
        let result = self.call(command, params).await?;
        check_status(command, result)
    }

    async fn autofill(&self, mut tx: Value) -> Result<Value, SniperError> {
        let account = tx
            .get("Account")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SniperError::Transaction("transaction has no Account".into()))?;

        let fields = tx
            .as_object_mut()
            .ok_or_else(|| SniperError::Transaction("transaction is not an object".into()))?;

        if !fields.contains_key("Sequence") {
            let sequence = self.next_sequence(&account).await?;
            fields.insert("Sequence".into(), json!(sequence));
        }
        if !fields.contains_key("Fee") {
            let fee = self.network_fee().await?;
            fields.insert("Fee".into(), json!(fee.to_string()));
        }
        if !fields.contains_key("LastLedgerSequence") {
            let current = self.current_ledger_index().await?;
            fields.insert("LastLedgerSequence".into(), json!(current + LEDGER_OFFSET));
        }

        debug!(account = %account, "Transaction autofilled");
        Ok(tx)
    }

    async fn submit_and_wait(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, SniperError> {
        let last_ledger = signed.last_ledger_sequence.ok_or_else(|| {
            SniperError::Transaction(format!("{} has no LastLedgerSequence", signed.hash))
        })?;

        let submitted = self
            .request("submit", json!({ "tx_blob": signed.tx_blob }))
            .await?;
        let hash = submitted
            .pointer("/tx_json/hash")
            .and_then(Value::as_str)
            .unwrap_or(&signed.hash)
            .to_string();
        let engine_result = preliminary_result(&hash, &submitted)?;

        debug!(hash = %hash, engine_result = %engine_result, last_ledger, "Submitted, awaiting validation");

        loop {
            tokio::time::sleep(self.poll_interval).await;

            // Unknown transactions come back as an error status while pending.
            let status = self.call("tx", json!({ "transaction": hash })).await?;

            match poll_state(&status) {
                PollState::Validated { result, .. } if result != "tesSUCCESS" => {
                    return Err(SniperError::Transaction(format!(
                        "{hash} validated with {result}"
                    )));
                }
                PollState::Validated { result, ledger_index } => {
                    return Ok(SubmitOutcome {
                        hash,
                        ledger_index,
                        engine_result: result,
                    });
                }
                PollState::Pending => {}
            }

            let validated_index = self.validated_ledger_index().await?;
            if validated_index > last_ledger {
                warn!(hash = %hash, last_ledger, validated_index, "Transaction expired");
                return Err(SniperError::Transaction(format!(
                    "{hash} not validated before ledger {last_ledger}"
                )));
            }
        }
    }
}
