//! Local wallet.
//!
//! Derives the key pair and classic address from the family seed and signs
//! transactions in-process with the XRPL binary codec. The seed and private
//! key never leave this process.

use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use sha2::{Digest, Sha512};
use tracing::{debug, info};
use xrpl::core::{binarycodec, keypairs};
use xrpl::wallet::Wallet;

use super::Signer;
use crate::types::{SignedTransaction, SniperError};

/// Hash prefix of a signed transaction (`TXN\0`).
const TXN_HASH_PREFIX: [u8; 4] = [0x54, 0x58, 0x4E, 0x00];

/// Wallet holding its key pair in memory.
pub struct LocalWallet {
    address: String,
    public_key: String,
    private_key: SecretString,
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl LocalWallet {
    /// Derive the wallet from a family seed (`s...`).
    pub fn from_seed(seed: &SecretString) -> Result<Self, SniperError> {
        let wallet = Wallet::new(seed.expose_secret(), 0)
            .map_err(|e| SniperError::Config(format!("invalid wallet seed: {e}")))?;

        info!(address = %wallet.classic_address, "Wallet loaded");

        Ok(Self {
            address: wallet.classic_address.clone(),
            public_key: wallet.public_key.clone(),
            private_key: SecretString::new(wallet.private_key.clone()),
        })
    }
}

impl Signer for LocalWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(&self, tx: &Value) -> Result<SignedTransaction, SniperError> {
        let mut tx = tx.clone();
        tx.as_object_mut()
            .ok_or_else(|| SniperError::Transaction("transaction is not an object".into()))?
            .insert("SigningPubKey".into(), json!(self.public_key));

        let signing_blob = binarycodec::encode_for_signing(&tx)
            .map_err(|e| SniperError::Transaction(format!("encoding for signing failed: {e}")))?;
        let message = hex::decode(&signing_blob)
            .map_err(|e| SniperError::Transaction(format!("invalid signing blob: {e}")))?;
        let signature = keypairs::sign(&message, self.private_key.expose_secret())
            .map_err(|e| SniperError::Transaction(format!("signing failed: {e}")))?;
        tx["TxnSignature"] = json!(signature);

        let tx_blob = binarycodec::encode(&tx)
            .map_err(|e| SniperError::Transaction(format!("encoding failed: {e}")))?;
        let hash = transaction_hash(&tx_blob)?;

        debug!(hash = %hash, "Transaction signed");

        Ok(SignedTransaction {
            tx_blob,
            hash,
            last_ledger_sequence: tx.get("LastLedgerSequence").and_then(Value::as_u64),
        })
    }
}

/// First half of SHA-512 over the prefixed blob, upper-case hex.
fn transaction_hash(tx_blob: &str) -> Result<String, SniperError> {
    let blob = hex::decode(tx_blob)
        .map_err(|e| SniperError::Transaction(format!("invalid transaction blob: {e}")))?;
    let mut hasher = Sha512::new();
    hasher.update(TXN_HASH_PREFIX);
    hasher.update(&blob);
    Ok(hex::encode_upper(&hasher.finalize()[..32]))
}
