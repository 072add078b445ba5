//! Journal command types
//!
//! A journal is a CSV replay of CSR operations. Each row becomes a
//! [`CommandRecord`] that the engine routes to the refund workflow.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ledger::ActorId;

/// Journal-local reference used by `process` rows to point at an earlier `refund`
pub type JournalRef = u32;

/// Operations a journal row can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// Credit the sponsor's ledger
    Deposit,

    /// Request a refund out of the sponsor's available balance
    Refund,

    /// Confirm a previously requested refund
    Process,
}

/// Parsed journal row
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRecord {
    pub command: CommandType,

    /// Owner of the ledger the command applies to; also the partition key
    pub sponsor: ActorId,

    /// Actor performing the command (the admin for `process` rows)
    pub actor: ActorId,

    /// Reference created by `deposit`/`refund`, consumed by `process`
    pub reference: JournalRef,

    /// Required for `deposit` and `refund`
    pub amount: Option<Decimal>,

    /// Reason for refunds, note for processing, description for deposits
    pub memo: Option<String>,
}
