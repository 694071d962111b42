//! End-to-end pipeline tests against an in-memory ledger.

mod mock_ledger;
mod pipeline;
