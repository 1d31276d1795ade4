//! In-process gateway for tests and local runs.
//!
//! Behaves like a single-node ledger: it tracks each account's sequence, accepts an envelope only
//! when its sequence is exactly the fee source's sequence plus one, and advances the account on
//! acceptance. Forced rejections still consume the sequence, like a transaction that made it into
//! a ledger and failed there.

use crate::envelope::SignedEnvelope;
use crate::gateway::{AccountDetail, LedgerGateway, SubmitOptions, SubmitResult};
use crate::types::AccountId;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct MockAccount {
    sequence: i64,
    memo_required: bool,
}

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, MockAccount>,
    submissions: Vec<SignedEnvelope>,
    reject_with: Option<String>,
    latency: Duration,
    detail_calls: usize,
    in_flight: HashMap<AccountId, usize>,
    max_in_flight: usize,
    ledger: u32,
}

/// [`LedgerGateway`] kept in memory
#[derive(Debug, Default)]
pub struct MockGateway {
    state: Mutex<State>,
}

impl MockGateway {
    /// Gateway with no accounts
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MockGateway::insert_account`]
    pub fn with_account(self, account_id: AccountId, sequence: i64) -> Self {
        self.insert_account(account_id, sequence);
        self
    }

    /// Create or reset an account at `sequence`
    pub fn insert_account(&self, account_id: AccountId, sequence: i64) {
        self.state.lock().accounts.insert(
            account_id,
            MockAccount {
                sequence,
                memo_required: false,
            },
        );
    }

    /// Mark an account as requiring a memo on incoming payments
    pub fn set_memo_required(&self, account_id: &AccountId) {
        let mut state = self.state.lock();
        let account = state
            .accounts
            .entry(account_id.clone())
            .or_insert(MockAccount {
                sequence: 0,
                memo_required: false,
            });
        account.memo_required = true;
    }

    /// Reject every following submission with `result_code`
    pub fn reject_submissions(&self, result_code: &str) {
        self.state.lock().reject_with = Some(result_code.to_string());
    }

    /// Stop forcing rejections
    pub fn accept_submissions(&self) {
        self.state.lock().reject_with = None;
    }

    /// Delay applied to every submission
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Current sequence of an account
    pub fn sequence(&self, account_id: &AccountId) -> Option<i64> {
        self.state.lock().accounts.get(account_id).map(|a| a.sequence)
    }

    /// Every envelope received, in arrival order
    pub fn submissions(&self) -> Vec<SignedEnvelope> {
        self.state.lock().submissions.clone()
    }

    /// Number of `account_detail` calls served
    pub fn detail_calls(&self) -> usize {
        self.state.lock().detail_calls
    }

    /// Highest number of simultaneous submissions seen from one fee source
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    fn begin_submission(&self, envelope: &SignedEnvelope) {
        let mut state = self.state.lock();
        let fee_source = envelope.tx.fee_source.clone();
        let current = {
            let slot = state.in_flight.entry(fee_source).or_insert(0);
            *slot += 1;
            *slot
        };
        state.max_in_flight = state.max_in_flight.max(current);
        state.submissions.push(envelope.clone());
    }

    fn end_submission(&self, envelope: &SignedEnvelope) -> Result<SubmitResult> {
        let mut state = self.state.lock();
        let fee_source = &envelope.tx.fee_source;
        if let Some(slot) = state.in_flight.get_mut(fee_source) {
            *slot -= 1;
        }

        let reject_with = state.reject_with.clone();
        let account = state
            .accounts
            .get_mut(fee_source)
            .ok_or_else(|| Error::AccountNotFound(fee_source.to_string()))?;

        if envelope.sequence() != account.sequence + 1 {
            return Err(rejected("tx_bad_seq"));
        }
        account.sequence = envelope.sequence();

        if let Some(code) = reject_with {
            return Err(rejected(&code));
        }

        state.ledger += 1;
        Ok(SubmitResult {
            hash: envelope.hash().to_hex(),
            ledger: Some(state.ledger),
        })
    }
}

fn rejected(code: &str) -> Error {
    Error::Rejected {
        status: 400,
        title: "Transaction Failed".to_string(),
        result_code: Some(code.to_string()),
    }
}

#[async_trait]
impl LedgerGateway for MockGateway {
    async fn account_detail(&self, account_id: &AccountId) -> Result<AccountDetail> {
        let mut state = self.state.lock();
        state.detail_calls += 1;
        let account = state
            .accounts
            .get(account_id)
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;

        Ok(AccountDetail {
            account_id: account_id.clone(),
            sequence: account.sequence,
            memo_required: account.memo_required,
        })
    }

    async fn submit_transaction(
        &self,
        envelope: &SignedEnvelope,
        opts: SubmitOptions,
    ) -> Result<SubmitResult> {
        let destination = &envelope.tx.inner.tx.destination;
        let (latency, memo_required) = {
            let state = self.state.lock();
            let memo_required = state
                .accounts
                .get(destination)
                .map_or(false, |a| a.memo_required);
            (state.latency, memo_required)
        };
        if memo_required && !opts.skip_memo_required_check {
            return Err(Error::MemoRequired(destination.to_string()));
        }

        self.begin_submission(envelope);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let result = self.end_submission(envelope);
        debug!(hash = %envelope.hash(), ok = result.is_ok(), "Mock gateway handled envelope");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{KeyPair, NetworkId};
    use crate::envelope::{FeeBumpTransaction, PaymentTransaction};
    use crate::types::Asset;
    use rust_decimal::Decimal;

    fn envelope(funding: &KeyPair, channel: &KeyPair, sequence: i64) -> SignedEnvelope {
        let network = NetworkId::from_passphrase("Test Network");
        let inner = PaymentTransaction {
            source: funding.account_id(),
            destination: AccountId::new("ACCT_B"),
            asset: Asset::Native,
            amount: Decimal::new(20, 0),
            fee: 100,
        }
        .sign(&network, funding)
        .unwrap();
        FeeBumpTransaction::new(channel.account_id(), sequence, 100, inner)
            .unwrap()
            .sign(&network, channel)
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_next_sequence_only() {
        let funding = KeyPair::generate();
        let channel = KeyPair::generate();
        let gateway = MockGateway::new().with_account(channel.account_id(), 100);

        let stale = gateway
            .submit_transaction(&envelope(&funding, &channel, 100), SubmitOptions::default())
            .await;
        assert_eq!(stale.unwrap_err().result_code(), Some("tx_bad_seq"));

        let ok = gateway
            .submit_transaction(&envelope(&funding, &channel, 101), SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(ok.ledger, Some(1));
        assert_eq!(gateway.sequence(&channel.account_id()), Some(101));
        assert_eq!(gateway.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_forced_rejection_consumes_sequence() {
        let funding = KeyPair::generate();
        let channel = KeyPair::generate();
        let gateway = MockGateway::new().with_account(channel.account_id(), 5);
        gateway.reject_submissions("tx_failed");

        let err = gateway
            .submit_transaction(&envelope(&funding, &channel, 6), SubmitOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.result_code(), Some("tx_failed"));
        assert_eq!(gateway.sequence(&channel.account_id()), Some(6));
    }

    #[tokio::test]
    async fn test_memo_required_unless_skipped() {
        let funding = KeyPair::generate();
        let channel = KeyPair::generate();
        let gateway = MockGateway::new().with_account(channel.account_id(), 0);
        gateway.set_memo_required(&AccountId::new("ACCT_B"));

        let err = gateway
            .submit_transaction(&envelope(&funding, &channel, 1), SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MemoRequired(_)));
        assert!(gateway.submissions().is_empty());

        let skip = SubmitOptions {
            skip_memo_required_check: true,
        };
        assert!(gateway
            .submit_transaction(&envelope(&funding, &channel, 1), skip)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_account_detail() {
        let gateway = MockGateway::new().with_account(AccountId::new("GCHAN"), 42);
        let detail = gateway.account_detail(&AccountId::new("GCHAN")).await.unwrap();
        assert_eq!(detail.sequence, 42);
        assert!(matches!(
            gateway.account_detail(&AccountId::new("GNONE")).await,
            Err(Error::AccountNotFound(_))
        ));
        assert_eq!(gateway.detail_calls(), 2);
    }
}
