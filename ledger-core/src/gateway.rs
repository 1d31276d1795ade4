//! Ledger gateway: account reads and envelope submission
//!
//! [`LedgerGateway`] is the seam the submission pipeline talks through. [`HttpGateway`]
//! speaks the REST dialect of a ledger front-end:
//!
//! - `GET  {base}/accounts/{id}` → `{"id": "...", "sequence": "123", "data": {...}}`
//! - `POST {base}/transactions` with form field `tx=<base64 envelope>`
//!
//! Non-2xx responses carry a problem document whose
//! `extras.result_codes.transaction` names the ledger result code.

use crate::envelope::SignedEnvelope;
use crate::types::AccountId;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

/// Account data key marking an account that only accepts payments with a memo
pub const MEMO_REQUIRED_KEY: &str = "config.memo_required";

/// Account state read from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDetail {
    /// Account id as reported by the ledger
    pub account_id: AccountId,
    /// Last sequence number consumed by the account
    pub sequence: i64,
    /// Whether the account requires incoming payments to carry a memo
    pub memo_required: bool,
}

/// Submission options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Skip the destination memo-required precheck
    pub skip_memo_required_check: bool,
}

/// Successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResult {
    /// Hash reported by the ledger
    pub hash: String,
    /// Ledger the transaction was included in, if reported
    pub ledger: Option<u32>,
}

/// Read account state and submit signed envelopes
#[async_trait]
pub trait LedgerGateway: Debug + Send + Sync {
    /// Current state of an account
    async fn account_detail(&self, account_id: &AccountId) -> Result<AccountDetail>;

    /// Submit a signed envelope
    async fn submit_transaction(
        &self,
        envelope: &SignedEnvelope,
        opts: SubmitOptions,
    ) -> Result<SubmitResult>;
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    id: String,
    sequence: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    #[serde(default)]
    ledger: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: Option<ResultCodes>,
}

#[derive(Debug, Deserialize)]
struct ResultCodes {
    #[serde(default)]
    transaction: Option<String>,
}

/// REST implementation of [`LedgerGateway`]
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Create a gateway for `base_url` with a per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn check_memo_required(&self, envelope: &SignedEnvelope) -> Result<()> {
        let destination = &envelope.tx.inner.tx.destination;
        match self.account_detail(destination).await {
            Ok(detail) if detail.memo_required => Err(Error::MemoRequired(destination.to_string())),
            Ok(_) => Ok(()),
            // Unfunded destinations cannot carry account data
            Err(Error::AccountNotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn account_detail(&self, account_id: &AccountId) -> Result<AccountDetail> {
        let url = format!("{}/accounts/{}", self.base_url, account_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::AccountNotFound(account_id.to_string()));
        }
        let body = response.text().await?;
        if !status.is_success() {
            return Err(parse_problem(status.as_u16(), &body));
        }

        parse_account(&body)
    }

    async fn submit_transaction(
        &self,
        envelope: &SignedEnvelope,
        opts: SubmitOptions,
    ) -> Result<SubmitResult> {
        if !opts.skip_memo_required_check {
            self.check_memo_required(envelope).await?;
        }

        let tx = envelope.to_base64()?;
        let url = format!("{}/transactions", self.base_url);
        debug!(hash = %envelope.hash(), sequence = envelope.sequence(), "Submitting envelope");

        let response = self.client.post(&url).form(&[("tx", tx.as_str())]).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = parse_problem(status.as_u16(), &body);
            warn!(hash = %envelope.hash(), error = %err, "Gateway rejected envelope");
            return Err(err);
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("submit response: {}", e)))?;
        Ok(SubmitResult {
            hash: parsed.hash,
            ledger: parsed.ledger,
        })
    }
}

fn parse_account(body: &str) -> Result<AccountDetail> {
    let parsed: AccountResponse = serde_json::from_str(body)
        .map_err(|e| Error::MalformedResponse(format!("account response: {}", e)))?;
    let sequence = parsed
        .sequence
        .parse::<i64>()
        .map_err(|e| Error::MalformedResponse(format!("sequence '{}': {}", parsed.sequence, e)))?;

    Ok(AccountDetail {
        account_id: AccountId::new(parsed.id),
        sequence,
        memo_required: parsed.data.contains_key(MEMO_REQUIRED_KEY),
    })
}

fn parse_problem(status: u16, body: &str) -> Error {
    let problem: Problem = serde_json::from_str(body).unwrap_or_default();
    let result_code = problem
        .extras
        .and_then(|e| e.result_codes)
        .and_then(|c| c.transaction);
    let title = if problem.title.is_empty() {
        format!("HTTP {}", status)
    } else {
        problem.title
    };

    Error::Rejected {
        status,
        title,
        result_code,
    }
}
