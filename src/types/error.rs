//! Error types for the CSR fund engine
//!
//! This module defines all error types that can occur while requesting,
//! processing and documenting sponsor fund movements.
//!
//! # Error Categories
//!
//! - **Input Errors**: non-positive amounts, missing actor or action, etc.
//! - **Lookup Errors**: unknown transactions, sponsors, invoices or journal references
//! - **Workflow Errors**: insufficient balance, wrong state, wrong transaction type
//! - **Infrastructure Errors**: storage, file I/O and journal parsing failures

use rust_decimal::Decimal;
use thiserror::Error;

use super::ledger::SponsorId;
use super::transaction::{FundTransactionType, TransactionId, TransactionStatus};

/// Main error type for the fund engine
///
/// Every variant keeps the data needed to tell the failure kinds apart, so
/// an outer layer can map them to distinct responses (see [`CsrError::http_status`]).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CsrError {
    /// Malformed or missing required input
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable reason
        message: String,
    },

    /// A referenced transaction, sponsor or invoice does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up
        entity: String,
        /// Identifier used for the lookup
        id: String,
    },

    /// Requested or confirmed amount exceeds the sponsor's available balance
    ///
    /// Checked once when a refund is requested and again when it is processed.
    #[error(
        "Insufficient balance for sponsor {sponsor}: available {available}, requested {requested}"
    )]
    InsufficientBalance {
        /// Sponsor ledger that was checked
        sponsor: SponsorId,
        /// Available balance at the time of the check
        available: Decimal,
        /// Amount that was asked for
        requested: Decimal,
    },

    /// Attempted transition from a transaction that is no longer pending
    #[error("Transaction {tx} is {status}, expected pending")]
    InvalidState {
        /// Transaction that was targeted
        tx: TransactionId,
        /// Status the transaction was found in
        status: TransactionStatus,
    },

    /// Refund processing was attempted on a non-refund transaction
    #[error("Transaction {tx} is a {tx_type} transaction, expected refund")]
    InvalidType {
        /// Transaction that was targeted
        tx: TransactionId,
        /// Actual type of the transaction
        tx_type: FundTransactionType,
    },

    /// An invoice with the same number has already been stored
    #[error("Invoice number {invoice_number} is already in use")]
    DuplicateInvoiceNumber {
        /// The clashing invoice number
        invoice_number: String,
    },

    /// A journal row referenced a `tx` that no earlier row created
    #[error("Unknown journal reference {reference} for {operation}")]
    UnknownReference {
        /// The journal-local reference
        reference: u32,
        /// Operation that needed the reference
        operation: String,
    },

    /// Arithmetic overflow would occur
    #[error("Arithmetic overflow in {operation} for sponsor {sponsor}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Sponsor whose ledger was being updated
        sponsor: SponsorId,
    },

    /// The backing store rejected or failed an operation
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure
        message: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// Journal parsing error occurred
    #[error("Journal parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

/// Convenience alias used across the crate
pub type CsrResult<T> = Result<T, CsrError>;

impl From<std::io::Error> for CsrError {
    fn from(error: std::io::Error) -> Self {
        CsrError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for CsrError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        CsrError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for CsrError {
    fn from(error: serde_json::Error) -> Self {
        CsrError::IoError {
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl CsrError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        CsrError::Validation {
            message: message.into(),
        }
    }

    /// Create a NotFound error
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        CsrError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(sponsor: SponsorId, available: Decimal, requested: Decimal) -> Self {
        CsrError::InsufficientBalance {
            sponsor,
            available,
            requested,
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(tx: TransactionId, status: TransactionStatus) -> Self {
        CsrError::InvalidState { tx, status }
    }

    /// Create an InvalidType error
    pub fn invalid_type(tx: TransactionId, tx_type: FundTransactionType) -> Self {
        CsrError::InvalidType { tx, tx_type }
    }

    /// Create a DuplicateInvoiceNumber error
    pub fn duplicate_invoice_number(invoice_number: &str) -> Self {
        CsrError::DuplicateInvoiceNumber {
            invoice_number: invoice_number.to_string(),
        }
    }

    /// Create an UnknownReference error
    pub fn unknown_reference(reference: u32, operation: &str) -> Self {
        CsrError::UnknownReference {
            reference,
            operation: operation.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, sponsor: SponsorId) -> Self {
        CsrError::ArithmeticOverflow {
            operation: operation.to_string(),
            sponsor,
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        CsrError::Storage {
            message: message.into(),
        }
    }

    /// HTTP status an API layer should answer with for this error
    ///
    /// The legacy controllers flattened everything to 500; this keeps the
    /// kinds apart instead.
    pub fn http_status(&self) -> u16 {
        match self {
            CsrError::Validation { .. } | CsrError::ParseError { .. } => 400,
            CsrError::NotFound { .. } | CsrError::UnknownReference { .. } => 404,
            CsrError::InvalidState { .. } | CsrError::DuplicateInvoiceNumber { .. } => 409,
            CsrError::InsufficientBalance { .. } | CsrError::InvalidType { .. } => 422,
            CsrError::ArithmeticOverflow { .. }
            | CsrError::Storage { .. }
            | CsrError::IoError { .. } => 500,
        }
    }
}
