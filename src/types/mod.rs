//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `ledger`: Sponsor ledger and identifiers
//! - `transaction`: Fund transactions and their status lifecycle
//! - `audit`: Append-only audit entries and queries
//! - `invoice`: Invoices, line items and rendered documents
//! - `command`: Journal rows replayed by the CLI
//! - `error`: Error types for the fund engine

pub mod audit;
pub mod command;
pub mod error;
pub mod invoice;
pub mod ledger;
pub mod transaction;

pub use audit::{ActorRole, AuditLogEntry, AuditQuery, NewAuditEntry};
pub use command::{CommandRecord, CommandType, JournalRef};
pub use error::{CsrError, CsrResult};
pub use invoice::{
    CreateInvoice, Invoice, InvoiceDocument, InvoiceDocumentMetadata, InvoiceId, InvoiceStatus,
    InvoiceTotals, InvoiceType, LineItem, LineItemInput, TaxBreakdown,
};
pub use ledger::{ActorId, LedgerResolution, SponsorId, SponsorLedger};
pub use transaction::{FundTransaction, FundTransactionType, TransactionId, TransactionStatus};
