//! Eligibility evaluator.
//!
//! Runs the three-stage gate on a single candidate:
//!
//! 1. issuer control (`account_info`)
//! 2. liquidity (`book_offers`, token → XRP)
//! 3. market cap (`account_lines`)
//!
//! Each stage issues its own RPC and a failing stage ends the pipeline,
//! so a rejected candidate never costs the later requests.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::{models, LedgerGateway};
use crate::strategy::{book_liquidity, issuer_relinquished_control, under_cap, MarketCapEstimator};
use crate::types::{Candidate, Evaluation, SniperError, Stage, Verdict};

pub struct Evaluator {
    gateway: Arc<dyn LedgerGateway>,
    market_cap: Arc<dyn MarketCapEstimator>,
    threshold: Decimal,
}

impl Evaluator {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        market_cap: Arc<dyn MarketCapEstimator>,
        threshold: Decimal,
    ) -> Self {
        Self {
            gateway,
            market_cap,
            threshold,
        }
    }

    /// Run the gate. `Err` means a stage could not be evaluated; a negative
    /// decision is `Ok` with a rejected verdict.
    pub async fn evaluate(&self, candidate: &Candidate) -> Result<Evaluation, SniperError> {
        if let Some(evaluation) = self.check_issuer_control(candidate).await? {
            return Ok(evaluation);
        }
        if let Some(evaluation) = self.check_liquidity(candidate).await? {
            return Ok(evaluation);
        }
        if let Some(evaluation) = self.check_market_cap(candidate).await? {
            return Ok(evaluation);
        }

        info!(issuer = %candidate.issuer, currency = %candidate.currency, "All gate stages passed");

        Ok(Evaluation {
            candidate: candidate.clone(),
            verdict: Verdict::Eligible,
            decided_by: Stage::MarketCap,
        })
    }

    // -- Stages ----------------------------------------------------------
    //
    // Each returns `Some(rejection)` to stop the pipeline, `None` to go on.

    async fn check_issuer_control(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<Evaluation>, SniperError> {
        let result = self
            .gateway
            .request(
                "account_info",
                json!({ "account": candidate.issuer, "ledger_index": "validated" }),
            )
            .await?;
        let state = models::account_state(result)?;

        debug!(
            issuer = %candidate.issuer,
            regular_key = state.regular_key.is_some(),
            master_disabled = state.master_disabled,
            "Issuer control fetched"
        );

        if issuer_relinquished_control(&state) {
            return Ok(None);
        }

        let detail = match (&state.regular_key, state.master_disabled) {
            (Some(key), true) => format!("regular key {key} is set"),
            (Some(key), false) => format!("master key enabled and regular key {key} is set"),
            (None, _) => "master key enabled".to_string(),
        };
        Ok(Some(reject(candidate, Stage::IssuerControl, detail)))
    }

    async fn check_liquidity(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<Evaluation>, SniperError> {
        let result = self
            .gateway
            .request(
                "book_offers",
                json!({
                    "taker_gets": { "currency": candidate.currency, "issuer": candidate.issuer },
                    "taker_pays": { "currency": "XRP" },
                    "ledger_index": "validated",
                }),
            )
            .await?;
        let offers = models::book_offers(result)?;
        let liquidity = book_liquidity(&candidate.issuer, &offers);

        debug!(
            issuer = %candidate.issuer,
            currency = %candidate.currency,
            offers = offers.len(),
            liquidity = %liquidity,
            "Order book fetched"
        );

        if liquidity > Decimal::ZERO {
            return Ok(None);
        }

        let detail = if offers.iter().any(|o| o.account == candidate.issuer) {
            "issuer is a counterparty in its own book".to_string()
        } else {
            format!("no liquidity across {} offers", offers.len())
        };
        Ok(Some(reject(candidate, Stage::Liquidity, detail)))
    }

    async fn check_market_cap(
        &self,
        candidate: &Candidate,
    ) -> Result<Option<Evaluation>, SniperError> {
        let result = self
            .gateway
            .request(
                "account_lines",
                json!({ "account": candidate.issuer, "ledger_index": "validated" }),
            )
            .await?;
        let lines = models::trust_lines(result)?;
        let cap = self.market_cap.estimate(candidate, &lines);

        debug!(
            issuer = %candidate.issuer,
            currency = %candidate.currency,
            estimator = self.market_cap.name(),
            cap = %cap,
            threshold = %self.threshold,
            "Market cap estimated"
        );

        if under_cap(cap, self.threshold) {
            return Ok(None);
        }

        let detail = format!("cap {cap} is not below threshold {}", self.threshold);
        Ok(Some(reject(candidate, Stage::MarketCap, detail)))
    }
}

fn reject(candidate: &Candidate, stage: Stage, detail: String) -> Evaluation {
    info!(
        issuer = %candidate.issuer,
        currency = %candidate.currency,
        stage = %stage,
        reason = %detail,
        "Candidate rejected"
    );
    Evaluation {
        candidate: candidate.clone(),
        verdict: Verdict::Rejected { stage, detail },
        decided_by: stage,
    }
}
