//! CSR Fund Engine Library
//! # Overview
//!
//! This library tracks money that corporate sponsors hold on a CSR
//! platform: deposits into a sponsor ledger, refund requests against the
//! unused balance, and the administrative processing that pays a refund
//! out. Every state change is recorded in an append-only audit trail, and
//! deposits and refunds are documented with invoices and credit notes.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (SponsorLedger, FundTransaction, Invoice, etc.)
//! - [`config`] - Engine and invoice settings
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::ledger_store`] - Sponsor ledgers and balance operations
//!   - [`core::transaction_store`] - Fund transactions and their lifecycle
//!   - [`core::refund_workflow`] - Refund request and processing rules
//!   - [`core::audit_log`] - Audit trail and best-effort recording
//!   - [`core::invoice`] - Invoice numbering, totals and documents
//!   - [`core::engine`] - Journal command routing
//! - [`io`] - Journal readers and report writers
//! - [`strategy`] - Sync and batched async journal replay
//!
//! # Refund Lifecycle
//!
//! - **Deposit**: Credit funds to the sponsor's available balance
//! - **Refund request**: Record a pending refund; the balance is untouched
//! - **Refund processing**: Re-check the balance, confirm the refund and
//!   debit the ledger as one step
//!
//! A pending refund is confirmed at most once. Concurrent attempts to
//! process the same refund leave exactly one winner and a single debit.
//!
//! # Ledger State
//!
//! Each sponsor ledger maintains:
//! - `available_balance`: Funds the sponsor can still draw on
//! - `committed_amount`: Funds earmarked for allocations, reported only
//!
//! The refundable amount is the available balance, floored at zero.

pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use config::{EngineConfig, InvoiceConfig};
pub use core::{
    AuditLogService, CsrEngine, FundTransactionStore, InvoiceGenerator, RefundWorkflowService,
    SponsorLedgerStore,
};
pub use io::write_ledgers_csv;
pub use types::{
    AuditLogEntry, CommandRecord, CommandType, CsrError, CsrResult, FundTransaction,
    FundTransactionType, Invoice, SponsorId, SponsorLedger, TransactionId, TransactionStatus,
};
