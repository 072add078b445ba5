//! Journal processing engine
//!
//! This module provides the `CsrEngine`, which replays journal commands
//! against the refund workflow and keeps the collaborators of a run together:
//! ledger and transaction stores, the audit trail and the invoice generator.
//!
//! The engine enforces journal rules on top of the workflow:
//! - `deposit` and `refund` rows are performed by the sponsor itself
//! - `process` rows are performed by someone other than the sponsor
//! - journal references are unique per sponsor, and `process` rows must
//!   point at an earlier `refund` of the same sponsor
//!
//! Every method takes `&self`, so one engine can be shared across tasks
//! through an `Arc`.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::config::EngineConfig;
use crate::core::audit_log::{AuditLogService, AuditRecorder};
use crate::core::invoice::InvoiceGenerator;
use crate::core::ledger_store::SponsorLedgerStore;
use crate::core::refund_workflow::{
    DepositReceipt, DepositRequest, ProcessRefund, ProcessedRefund, RefundRequest,
    RefundWorkflowService,
};
use crate::core::transaction_store::FundTransactionStore;
use crate::types::{
    ActorId, CommandRecord, CommandType, CreateInvoice, CsrError, CsrResult, FundTransaction,
    FundTransactionType, Invoice, InvoiceStatus, InvoiceType, JournalRef, SponsorId, TransactionId,
};

const DEPOSIT_DESCRIPTION: &str = "CSR fund deposit";
const REFUND_DESCRIPTION: &str = "Refund of unused CSR funds";

/// What a successfully applied command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Deposited(DepositReceipt),
    RefundRequested(FundTransaction),
    RefundProcessed(ProcessedRefund),
}

/// Ledger state as reported at the end of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    pub sponsor: ActorId,
    pub available: Decimal,
    pub committed: Decimal,
    pub refundable: Decimal,
    /// Sum of refunds still waiting to be processed
    pub pending: Decimal,
}

/// Journal processing engine
pub struct CsrEngine {
    workflow: RefundWorkflowService,
    recorder: AuditRecorder,
    audit: AuditLogService,
    invoices: InvoiceGenerator,
    config: EngineConfig,
    references: DashMap<(ActorId, JournalRef), TransactionId>,
}

impl CsrEngine {
    /// Engine with in-memory stores and inline audit writes
    pub fn new(config: EngineConfig) -> Self {
        let audit = AuditLogService::in_memory(config.audit_trail_limit);
        let recorder = AuditRecorder::inline(audit.clone());
        Self::with_audit(config, audit, recorder)
    }

    /// Engine writing audit entries through the given recorder
    ///
    /// `audit` is the service used to read the trail back; it should be
    /// the one `recorder` writes to.
    pub fn with_audit(config: EngineConfig, audit: AuditLogService, recorder: AuditRecorder) -> Self {
        let workflow = RefundWorkflowService::new(
            Arc::new(SponsorLedgerStore::new()),
            Arc::new(FundTransactionStore::new()),
            recorder.clone(),
        );
        let invoices = InvoiceGenerator::with_sequential_numbers(config.invoice.clone());

        CsrEngine {
            workflow,
            recorder,
            audit,
            invoices,
            config,
            references: DashMap::new(),
        }
    }

    /// Apply one journal command
    ///
    /// # Errors
    ///
    /// - `Validation` for missing amounts, wrong actors or reused references
    /// - `UnknownReference` for a `process` row without a matching `refund`
    /// - any workflow error (`InsufficientBalance`, `InvalidState`, ...)
    pub fn process(&self, record: CommandRecord) -> CsrResult<CommandOutcome> {
        match record.command {
            CommandType::Deposit => self.process_deposit(record),
            CommandType::Refund => self.process_refund_request(record),
            CommandType::Process => self.process_refund_confirmation(record),
        }
    }

    fn process_deposit(&self, record: CommandRecord) -> CsrResult<CommandOutcome> {
        ensure_sponsor_acts(&record)?;
        self.ensure_reference_free(&record)?;
        let amount = required_amount(&record)?;

        let receipt = self.workflow.deposit_funds(
            &record.sponsor,
            DepositRequest {
                amount,
                proof_url: None,
                note: record.memo.clone(),
            },
        )?;
        self.remember(&record, receipt.transaction.id);

        issue_best_effort(
            || {
                self.invoices.create_tax_invoice(CreateInvoice {
                    payment_id: Some(receipt.transaction.id),
                    organization_id: Some(record.sponsor.clone()),
                    sponsor_id: Some(receipt.sponsor.id),
                    amount: Some(amount),
                    description: Some(
                        record
                            .memo
                            .clone()
                            .unwrap_or_else(|| DEPOSIT_DESCRIPTION.to_string()),
                    ),
                    ..Default::default()
                })
            },
            receipt.transaction.id,
        );

        Ok(CommandOutcome::Deposited(receipt))
    }

    fn process_refund_request(&self, record: CommandRecord) -> CsrResult<CommandOutcome> {
        ensure_sponsor_acts(&record)?;
        self.ensure_reference_free(&record)?;
        let amount = required_amount(&record)?;

        let transaction = self.workflow.request_refund(
            &record.sponsor,
            RefundRequest {
                amount,
                reason: record.memo.clone(),
                proof_url: None,
            },
        )?;
        self.remember(&record, transaction.id);

        Ok(CommandOutcome::RefundRequested(transaction))
    }

    fn process_refund_confirmation(&self, record: CommandRecord) -> CsrResult<CommandOutcome> {
        if record.actor == record.sponsor {
            return Err(CsrError::validation(format!(
                "refund {} of {} must be processed by an admin, not the sponsor",
                record.reference, record.sponsor
            )));
        }

        let tx_id = self
            .references
            .get(&(record.sponsor.clone(), record.reference))
            .map(|entry| *entry.value())
            .ok_or_else(|| CsrError::unknown_reference(record.reference, "process"))?;

        let processed = self.workflow.process_refund(
            tx_id,
            &record.actor,
            ProcessRefund {
                note: record.memo.clone(),
            },
        )?;

        issue_best_effort(
            || {
                self.invoices.create_invoice(CreateInvoice {
                    invoice_type: Some(InvoiceType::CreditNote),
                    status: Some(InvoiceStatus::Sent),
                    payment_id: Some(processed.transaction.id),
                    organization_id: Some(record.sponsor.clone()),
                    sponsor_id: Some(processed.sponsor.id),
                    amount: Some(processed.transaction.amount),
                    description: Some(REFUND_DESCRIPTION.to_string()),
                    tax_rate: Some(Decimal::ZERO),
                    ..Default::default()
                })
            },
            processed.transaction.id,
        );

        Ok(CommandOutcome::RefundProcessed(processed))
    }

    fn ensure_reference_free(&self, record: &CommandRecord) -> CsrResult<()> {
        if self
            .references
            .contains_key(&(record.sponsor.clone(), record.reference))
        {
            return Err(CsrError::validation(format!(
                "journal reference {} is already used by {}",
                record.reference, record.sponsor
            )));
        }
        Ok(())
    }

    fn remember(&self, record: &CommandRecord, tx_id: TransactionId) {
        self.references
            .insert((record.sponsor.clone(), record.reference), tx_id);
    }

    /// End-of-run state of every ledger, sorted by sponsor
    pub fn ledger_summaries(&self) -> Vec<LedgerSummary> {
        let mut pending: HashMap<SponsorId, Decimal> = HashMap::new();
        for tx in self
            .workflow
            .transactions()
            .pending_of_type(FundTransactionType::Refund)
        {
            *pending.entry(tx.sponsor_id).or_insert(Decimal::ZERO) += tx.amount;
        }

        self.workflow
            .ledgers()
            .all()
            .into_iter()
            .map(|ledger| LedgerSummary {
                pending: pending.get(&ledger.id).copied().unwrap_or(Decimal::ZERO),
                available: ledger.available_balance,
                committed: ledger.committed_amount,
                refundable: ledger.refundable(),
                sponsor: ledger.owner,
            })
            .collect()
    }

    pub fn workflow(&self) -> &RefundWorkflowService {
        &self.workflow
    }

    pub fn invoices(&self) -> &InvoiceGenerator {
        &self.invoices
    }

    pub fn audit(&self) -> &AuditLogService {
        &self.audit
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Wait until queued audit entries have been written
    pub async fn flush_audit(&self) {
        self.recorder.flush().await;
    }
}

fn ensure_sponsor_acts(record: &CommandRecord) -> CsrResult<()> {
    if record.actor != record.sponsor {
        return Err(CsrError::validation(format!(
            "{:?} for {} cannot be performed by {}",
            record.command, record.sponsor, record.actor
        )));
    }
    Ok(())
}

/// Invoices document money movements but never gate them
fn issue_best_effort<F>(issue: F, tx_id: TransactionId)
where
    F: FnOnce() -> CsrResult<Invoice>,
{
    if let Err(err) = issue() {
        warn!(tx = %tx_id, error = %err, "invoice generation failed");
    }
}

fn required_amount(record: &CommandRecord) -> CsrResult<Decimal> {
    record.amount.ok_or_else(|| {
        CsrError::validation(format!(
            "{:?} {} for {} requires an amount",
            record.command, record.reference, record.sponsor
        ))
    })
}
