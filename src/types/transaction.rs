//! Fund transaction types for the CSR fund engine
//!
//! This module defines fund transaction kinds, their status lifecycle and the
//! stored transaction record used by the refund workflow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::ledger::{ActorId, SponsorId};

/// Metadata key holding the reason given when a refund was requested
pub const METADATA_REASON: &str = "reason";

/// Metadata key holding the admin note attached on confirmation
pub const METADATA_PROCESSED_NOTE: &str = "processedNote";

/// Fund transaction identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Kinds of money movement recorded against a sponsor ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundTransactionType {
    /// Money handed back to the sponsor out of its available balance
    ///
    /// The only kind with a request/process lifecycle.
    Refund,

    /// Money paid in by the sponsor
    Deposit,

    /// Money earmarked for a programme
    Allocation,
}

impl fmt::Display for FundTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FundTransactionType::Refund => "refund",
            FundTransactionType::Deposit => "deposit",
            FundTransactionType::Allocation => "allocation",
        };
        f.write_str(name)
    }
}

/// Status of a fund transaction
///
/// Transitions only go forward: `Pending -> Confirmed`. There is no
/// rejected or cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::Pending => f.write_str("pending"),
            TransactionStatus::Confirmed => f.write_str("confirmed"),
        }
    }
}

/// A single money-movement request against a sponsor ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundTransaction {
    pub id: TransactionId,

    /// Ledger the money moves against
    pub sponsor_id: SponsorId,

    /// Always strictly positive
    pub amount: Decimal,

    #[serde(rename = "type")]
    pub tx_type: FundTransactionType,

    pub status: TransactionStatus,

    /// Actor that created the transaction
    pub initiated_by: ActorId,

    /// Admin that confirmed the transaction, set only on confirmation
    pub approved_by: Option<ActorId>,

    /// Optional evidence reference (receipt scan, bank slip, ...)
    pub proof_url: Option<String>,

    /// Free-form annotations such as `reason` and `processedNote`
    pub metadata: BTreeMap<String, String>,

    /// Set when the transaction is confirmed
    pub allocated_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FundTransaction {
    /// Create a pending transaction with a fresh id
    pub fn pending(
        sponsor_id: SponsorId,
        tx_type: FundTransactionType,
        amount: Decimal,
        initiated_by: &str,
    ) -> Self {
        let now = Utc::now();
        FundTransaction {
            id: TransactionId::generate(),
            sponsor_id,
            amount,
            tx_type,
            status: TransactionStatus::Pending,
            initiated_by: initiated_by.to_string(),
            approved_by: None,
            proof_url: None,
            metadata: BTreeMap::new(),
            allocated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    /// Value of a metadata key, if present
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}
