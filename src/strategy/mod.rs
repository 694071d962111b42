//! Gate strategies.
//!
//! Pure decision helpers used by the evaluator: the issuer-control rule,
//! the liquidity sum, and the replaceable market-cap estimator.

use rust_decimal::Decimal;

use crate::types::{AccountState, BookOffer, Candidate, TrustLine};

/// Issuer-control rule: no regular key AND master key disabled.
pub fn issuer_relinquished_control(state: &AccountState) -> bool {
    state.is_blackholed()
}

/// Total offered size in the book, forced to zero when the issuer itself
/// is a counterparty on any offer.
pub fn book_liquidity(issuer: &str, offers: &[BookOffer]) -> Decimal {
    if offers.iter().any(|o| o.account == issuer) {
        return Decimal::ZERO;
    }
    offers.iter().map(|o| o.size).sum()
}

/// Estimates a token's market cap from the issuer's trust lines.
pub trait MarketCapEstimator: Send + Sync {
    fn estimate(&self, candidate: &Candidate, lines: &[TrustLine]) -> Decimal;

    fn name(&self) -> &str;
}

/// Balance of the first trust line in the candidate's currency, zero if none.
///
/// This is one holder's balance, not the issued supply, so it understates
/// the cap of any token with more than one holder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstTrustLineBalance;

impl MarketCapEstimator for FirstTrustLineBalance {
    fn estimate(&self, candidate: &Candidate, lines: &[TrustLine]) -> Decimal {
        lines
            .iter()
            .find(|line| line.currency == candidate.currency)
            .map(|line| line.balance)
            .unwrap_or(Decimal::ZERO)
    }

    fn name(&self) -> &str {
        "first-trust-line"
    }
}

/// Market-cap gate: strictly below the threshold.
pub fn under_cap(cap: Decimal, threshold: Decimal) -> bool {
    cap < threshold
}
