//! Core business logic module
//!
//! This module contains the fund engine components:
//! - `traits` - Seams for the audit store and invoice numbering
//! - `ledger_store` - Sponsor ledgers with find-or-create resolution
//! - `transaction_store` - Fund transactions and the conditional confirm
//! - `audit_log` - Append-only audit trail and best-effort recording
//! - `refund_workflow` - Refund request/process lifecycle and deposits
//! - `invoice` - Invoices, credit notes and their totals
//! - `engine` - Journal command routing
//! - `batch_processor` - Per-sponsor parallel batch application

pub mod audit_log;
pub mod batch_processor;
pub mod engine;
pub mod invoice;
pub mod ledger_store;
pub mod refund_workflow;
pub mod traits;
pub mod transaction_store;

pub use audit_log::{AuditLogService, AuditRecorder, AuditWorker, InMemoryAuditLog};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::{CommandOutcome, CsrEngine, LedgerSummary};
pub use invoice::{calculate_totals, InvoiceGenerator, InvoiceStore, SequentialInvoiceNumbers};
pub use ledger_store::SponsorLedgerStore;
pub use refund_workflow::{
    DepositReceipt, DepositRequest, PendingRefund, ProcessRefund, ProcessedRefund,
    RefundRequest, RefundWorkflowService, RefundableAmount,
};
pub use traits::{AuditLogStore, InvoiceNumberGenerator};
pub use transaction_store::FundTransactionStore;
