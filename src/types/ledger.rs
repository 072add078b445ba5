//! Sponsor ledger types
//!
//! A sponsor ledger holds the balance a CSR sponsor can still draw on.
//! Ledgers are created lazily the first time an actor is referenced and
//! are never deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of a user acting on the platform (CSR staff, admin, ...)
pub type ActorId = String;

/// Sponsor ledger identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SponsorId(pub Uuid);

impl SponsorId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        SponsorId(Uuid::new_v4())
    }
}

impl fmt::Display for SponsorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Balance-holding record for a sponsor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorLedger {
    /// Ledger identifier, referenced by fund transactions
    pub id: SponsorId,

    /// Actor the ledger was resolved for
    pub owner: ActorId,

    /// Name shown next to pending refunds in admin listings
    pub display_name: String,

    /// Funds the sponsor can still draw on
    ///
    /// Never negative after a committed mutation.
    pub available_balance: Decimal,

    /// Funds earmarked for allocations
    ///
    /// Reported but not moved by the refund workflow.
    pub committed_amount: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SponsorLedger {
    /// Create a new ledger with zero balances
    ///
    /// The display name defaults to the owner id until a better one is known.
    pub fn new(owner: &str) -> Self {
        let now = Utc::now();
        SponsorLedger {
            id: SponsorId::generate(),
            owner: owner.to_string(),
            display_name: owner.to_string(),
            available_balance: Decimal::ZERO,
            committed_amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Amount that can currently be refunded: `max(0, available_balance)`
    pub fn refundable(&self) -> Decimal {
        self.available_balance.max(Decimal::ZERO)
    }
}

/// Outcome of a find-or-create ledger lookup
///
/// Lets callers tell a first-touch creation apart from a steady-state lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerResolution {
    /// The ledger already existed
    Found(SponsorLedger),
    /// The ledger was created by this lookup
    Created(SponsorLedger),
}

impl LedgerResolution {
    pub fn ledger(&self) -> &SponsorLedger {
        match self {
            LedgerResolution::Found(ledger) | LedgerResolution::Created(ledger) => ledger,
        }
    }

    pub fn into_ledger(self) -> SponsorLedger {
        match self {
            LedgerResolution::Found(ledger) | LedgerResolution::Created(ledger) => ledger,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, LedgerResolution::Created(_))
    }
}
