//! Acquisition executor.
//!
//! Builds the fixed-cost payment for an eligible candidate, has the
//! gateway autofill it, signs it with the bot wallet, then submits and
//! waits for validation. Nothing is committed before validation, so a
//! failure at any step leaves nothing to undo.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ledger::{LedgerGateway, Signer};
use crate::types::{xrp_to_drops, Candidate, CandidateOutcome, IssuedAmount, PaymentTx, SniperError};

pub struct Executor {
    gateway: Arc<dyn LedgerGateway>,
    signer: Arc<dyn Signer>,
    fee_xrp: Decimal,
    dry_run: bool,
}

impl Executor {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        signer: Arc<dyn Signer>,
        fee_xrp: Decimal,
        dry_run: bool,
    ) -> Self {
        Self {
            gateway,
            signer,
            fee_xrp,
            dry_run,
        }
    }

    /// Payment from the bot to the issuer for the fixed fee, with SendMax
    /// bounding the spend in the candidate's own currency.
    pub fn build_payment(&self, candidate: &Candidate) -> Result<PaymentTx, SniperError> {
        Ok(PaymentTx {
            transaction_type: "Payment".to_string(),
            account: self.signer.address().to_string(),
            destination: candidate.issuer.clone(),
            amount: xrp_to_drops(self.fee_xrp)?,
            send_max: IssuedAmount {
                currency: candidate.currency.clone(),
                issuer: candidate.issuer.clone(),
                value: self.fee_xrp.normalize().to_string(),
            },
        })
    }

    /// Acquire a position in `candidate`. Any step failing is a
    /// candidate-scoped `SniperError::Transaction`; there is no retry.
    pub async fn acquire(&self, candidate: &Candidate) -> Result<CandidateOutcome, SniperError> {
        let payment = self.build_payment(candidate)?;

        if self.dry_run {
            info!(
                issuer = %candidate.issuer,
                currency = %candidate.currency,
                amount_drops = %payment.amount,
                "[DRY RUN] Would acquire"
            );
            return Ok(CandidateOutcome::WouldAcquire {
                candidate: candidate.clone(),
                payment,
            });
        }

        let tx = serde_json::to_value(&payment)
            .map_err(|e| SniperError::Transaction(format!("failed to encode payment: {e}")))?;

        let prepared = self
            .gateway
            .autofill(tx)
            .await
            .map_err(|e| as_transaction_error("autofill", e))?;
        debug!(issuer = %candidate.issuer, "Payment prepared");

        let signed = self.signer.sign(&prepared).map_err(|e| as_transaction_error("sign", e))?;

        let outcome = self
            .gateway
            .submit_and_wait(&signed)
            .await
            .map_err(|e| as_transaction_error("submit", e))?;

        if !outcome.hash.eq_ignore_ascii_case(&signed.hash) {
            return Err(SniperError::Transaction(format!(
                "ledger reported hash {} for signed transaction {}",
                outcome.hash, signed.hash
            )));
        }

        info!(
            issuer = %candidate.issuer,
            currency = %candidate.currency,
            hash = %outcome.hash,
            ledger_index = ?outcome.ledger_index,
            engine_result = %outcome.engine_result,
            "Acquisition validated"
        );

        Ok(CandidateOutcome::Acquired {
            candidate: candidate.clone(),
            hash: outcome.hash,
        })
    }
}

fn as_transaction_error(step: &str, error: SniperError) -> SniperError {
    match error {
        SniperError::Transaction(_) => error,
        other => SniperError::Transaction(format!("{step} failed: {other}")),
    }
}
