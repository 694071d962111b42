//! Ledger integration.
//!
//! Defines the `LedgerGateway` and `Signer` traits the engine talks to,
//! and provides implementations for:
//! - rippled JSON-RPC over HTTP (`jsonrpc`)
//! - a local wallet that derives its key pair from the seed and signs
//!   in-process (`wallet`)

pub mod jsonrpc;
pub mod models;
pub mod wallet;

use async_trait::async_trait;
use serde_json::Value;

use crate::types::{SignedTransaction, SniperError, SubmitOutcome};

/// Abstraction over a ledger session.
///
/// One gateway is shared read-only by every concurrent candidate
/// pipeline, so implementors must be `Send + Sync` and hold no
/// per-call mutable state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Open the session. Failure here is startup-fatal.
    async fn connect(&self) -> Result<(), SniperError>;

    /// Close the session.
    async fn disconnect(&self) -> Result<(), SniperError>;

    /// Issue a raw command (`account_info`, `book_offers`, ...) and return
    /// its `result` object. Ledger-reported errors map to `SniperError::Rpc`.
    async fn request(&self, command: &str, params: Value) -> Result<Value, SniperError>;

    /// Fill in network-required fields (`Fee`, `Sequence`,
    /// `LastLedgerSequence`) that the transaction does not already carry.
    async fn autofill(&self, tx: Value) -> Result<Value, SniperError>;

    /// Submit a signed transaction and wait until the ledger validates it
    /// or its `LastLedgerSequence` passes.
    async fn submit_and_wait(&self, signed: &SignedTransaction) -> Result<SubmitOutcome, SniperError>;
}

/// Holder of the bot's signing credential.
pub trait Signer: Send + Sync {
    /// Classic address the acquisitions are paid from.
    fn address(&self) -> &str;

    /// Sign a fully autofilled transaction.
    fn sign(&self, tx: &Value) -> Result<SignedTransaction, SniperError>;
}
