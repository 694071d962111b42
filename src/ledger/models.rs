//! Ledger JSON → Rust.
//!
//! Only the fields the gate reads are deserialized; everything else in a
//! rippled response is ignored.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{parse_amount, parse_value, AccountState, BookOffer, SniperError, TrustLine};

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    account_data: AccountRoot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AccountRoot {
    #[serde(default)]
    flags: u32,
    #[serde(default)]
    regular_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BookOffersResult {
    #[serde(default)]
    offers: Vec<RawOffer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawOffer {
    account: String,
    taker_gets: Value,
}

#[derive(Debug, Deserialize)]
struct AccountLinesResult {
    #[serde(default)]
    lines: Vec<RawLine>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    currency: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
struct LedgerDataResult {
    #[serde(default)]
    state: Vec<Value>,
}

fn decode<T: serde::de::DeserializeOwned>(command: &str, result: Value) -> Result<T, SniperError> {
    serde_json::from_value(result)
        .map_err(|e| SniperError::rpc(command, format!("unexpected response shape: {e}")))
}

// ---------------------------------------------------------------------------
// Decoders
// ---------------------------------------------------------------------------

/// `account_info` → issuer control configuration.
pub fn account_state(result: Value) -> Result<AccountState, SniperError> {
    let info: AccountInfoResult = decode("account_info", result)?;
    Ok(AccountState::from_flags(
        info.account_data.flags,
        info.account_data.regular_key,
    ))
}

/// `book_offers` → counterparty and offered size of every offer.
pub fn book_offers(result: Value) -> Result<Vec<BookOffer>, SniperError> {
    let book: BookOffersResult = decode("book_offers", result)?;
    book.offers
        .into_iter()
        .map(|offer| {
            let size = parse_amount(&offer.taker_gets)
                .map_err(|e| SniperError::rpc("book_offers", e.to_string()))?;
            Ok(BookOffer {
                account: offer.account,
                size,
            })
        })
        .collect()
}

/// `account_lines` → currency and balance of every line, in ledger order.
pub fn trust_lines(result: Value) -> Result<Vec<TrustLine>, SniperError> {
    let lines: AccountLinesResult = decode("account_lines", result)?;
    lines
        .lines
        .into_iter()
        .map(|line| {
            let balance = parse_value(&line.balance)
                .map_err(|e| SniperError::rpc("account_lines", e.to_string()))?;
            Ok(TrustLine {
                currency: line.currency,
                balance,
            })
        })
        .collect()
}

/// `ledger_data` → raw state entries.
pub fn ledger_state(result: Value) -> Result<Vec<Value>, SniperError> {
    let data: LedgerDataResult = decode("ledger_data", result)?;
    Ok(data.state)
}
