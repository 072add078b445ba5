//! Refund workflow
//!
//! This module provides the `RefundWorkflowService`, which governs a refund
//! from request to settlement and records sponsor deposits.
//!
//! # Refund Lifecycle
//!
//! ```text
//! request_refund ──▶ Pending ──process_refund──▶ Confirmed (terminal)
//! ```
//!
//! The available balance is checked twice: once when the refund is requested
//! and again when it is processed, since other refunds may have been settled
//! in between. Nothing is reserved at request time.
//!
//! # Confirmation
//!
//! `process_refund` runs the balance re-check, the `Pending -> Confirmed`
//! conditional update and the debit while holding the owning ledger's entry
//! lock. The transaction is confirmed before the ledger is debited, and only
//! one caller can ever confirm a given transaction, so it is debited at most
//! once.
//!
//! Audit entries are written with [`AuditRecorder::record_best_effort`]
//! after the state change; an audit failure never fails the operation.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::audit_log::AuditRecorder;
use crate::core::ledger_store::{apply_credit, apply_debit, SponsorLedgerStore};
use crate::core::transaction_store::FundTransactionStore;
use crate::types::audit::{
    ACTION_DEPOSIT_FUNDS, ACTION_PROCESS_REFUND, ACTION_REQUEST_REFUND, RESOURCE_FUND_TRANSACTION,
};
use crate::types::transaction::{METADATA_PROCESSED_NOTE, METADATA_REASON};
use crate::types::{
    ActorRole, CsrError, CsrResult, FundTransaction, FundTransactionType, NewAuditEntry, SponsorId,
    SponsorLedger, TransactionId, TransactionStatus,
};

/// Input of a refund request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefundRequest {
    pub amount: Decimal,
    pub reason: Option<String>,
    pub proof_url: Option<String>,
}

/// Input of an admin confirming a refund
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessRefund {
    pub note: Option<String>,
}

/// Input of a sponsor deposit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepositRequest {
    pub amount: Decimal,
    pub proof_url: Option<String>,
    pub note: Option<String>,
}

/// Balances shown to a CSR before requesting a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundableAmount {
    pub available_balance: Decimal,
    pub committed_amount: Decimal,
    /// `max(0, available_balance)`
    pub refundable: Decimal,
}

/// Confirmed refund together with the debited ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedRefund {
    pub transaction: FundTransaction,
    pub sponsor: SponsorLedger,
}

/// Recorded deposit together with the credited ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepositReceipt {
    pub transaction: FundTransaction,
    pub sponsor: SponsorLedger,
}

/// Pending refund as listed for admins
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRefund {
    pub transaction: FundTransaction,
    /// Display name of the owning sponsor, if the ledger could be found
    pub sponsor_name: Option<String>,
}

/// Refund and deposit workflow over shared ledger and transaction stores
#[derive(Clone)]
pub struct RefundWorkflowService {
    ledgers: Arc<SponsorLedgerStore>,
    transactions: Arc<FundTransactionStore>,
    audit: AuditRecorder,
}

impl RefundWorkflowService {
    pub fn new(
        ledgers: Arc<SponsorLedgerStore>,
        transactions: Arc<FundTransactionStore>,
        audit: AuditRecorder,
    ) -> Self {
        RefundWorkflowService {
            ledgers,
            transactions,
            audit,
        }
    }

    pub fn ledgers(&self) -> &Arc<SponsorLedgerStore> {
        &self.ledgers
    }

    pub fn transactions(&self) -> &Arc<FundTransactionStore> {
        &self.transactions
    }

    /// Balances of the actor's ledger, creating the ledger on first touch
    pub fn calculate_refundable_amount(&self, actor: &str) -> CsrResult<RefundableAmount> {
        let resolution = self.ledgers.resolve(actor)?;
        let ledger = resolution.ledger();

        Ok(RefundableAmount {
            available_balance: ledger.available_balance,
            committed_amount: ledger.committed_amount,
            refundable: ledger.refundable(),
        })
    }

    /// Create a pending refund against the actor's ledger
    ///
    /// The ledger balance is not changed until the refund is processed.
    ///
    /// # Errors
    ///
    /// - `Validation` if `amount <= 0`
    /// - `InsufficientBalance` if `amount` exceeds the available balance
    pub fn request_refund(&self, actor: &str, request: RefundRequest) -> CsrResult<FundTransaction> {
        ensure_positive(request.amount)?;

        let ledger = self.ledgers.resolve(actor)?.into_ledger();
        if request.amount > ledger.available_balance {
            return Err(CsrError::insufficient_balance(
                ledger.id,
                ledger.available_balance,
                request.amount,
            ));
        }

        let mut transaction =
            FundTransaction::pending(ledger.id, FundTransactionType::Refund, request.amount, actor);
        transaction.proof_url = request.proof_url;
        if let Some(reason) = &request.reason {
            transaction
                .metadata
                .insert(METADATA_REASON.to_string(), reason.clone());
        }

        self.transactions.insert(transaction.clone())?;
        info!(
            tx = %transaction.id,
            sponsor = %ledger.id,
            amount = %transaction.amount,
            "refund requested"
        );

        self.audit.record_best_effort(
            NewAuditEntry::new(actor, ACTION_REQUEST_REFUND)
                .role(ActorRole::Csr)
                .resource(RESOURCE_FUND_TRANSACTION, transaction.id)
                .metadata(json!({
                    "amount": transaction.amount,
                    "reason": request.reason,
                })),
        );

        Ok(transaction)
    }

    /// Confirm a pending refund and debit the sponsor's ledger
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `NotFound` if the transaction does not exist
    /// - `InvalidType` if it is not a refund
    /// - `InvalidState` if it is not pending (also when a concurrent call won)
    /// - `NotFound` if the owning ledger is missing
    /// - `InsufficientBalance` if the ledger can no longer cover the amount
    pub fn process_refund(
        &self,
        id: TransactionId,
        admin: &str,
        input: ProcessRefund,
    ) -> CsrResult<ProcessedRefund> {
        let transaction = self
            .transactions
            .get(id)
            .ok_or_else(|| CsrError::not_found("FundTransaction", id))?;

        if transaction.tx_type != FundTransactionType::Refund {
            return Err(CsrError::invalid_type(id, transaction.tx_type));
        }
        if transaction.status != TransactionStatus::Pending {
            return Err(CsrError::invalid_state(id, transaction.status));
        }

        let confirmed_at = Utc::now();
        let note = input.note.as_deref();

        let (sponsor, confirmed) = self.ledgers.update(transaction.sponsor_id, |ledger| {
            if ledger.available_balance < transaction.amount {
                return Err(CsrError::insufficient_balance(
                    ledger.id,
                    ledger.available_balance,
                    transaction.amount,
                ));
            }

            let confirmed = self
                .transactions
                .confirm_pending(id, admin, note, confirmed_at)?;
            apply_debit(ledger, confirmed.amount)?;
            Ok(confirmed)
        })?;

        info!(
            tx = %id,
            sponsor = %sponsor.id,
            amount = %confirmed.amount,
            available = %sponsor.available_balance,
            "refund confirmed"
        );

        self.audit.record_best_effort(
            NewAuditEntry::new(admin, ACTION_PROCESS_REFUND)
                .role(ActorRole::Admin)
                .resource(RESOURCE_FUND_TRANSACTION, id)
                .metadata(json!({
                    "amount": confirmed.amount,
                    "sponsorId": sponsor.id,
                    "note": confirmed.metadata_value(METADATA_PROCESSED_NOTE),
                })),
        );

        Ok(ProcessedRefund {
            transaction: confirmed,
            sponsor,
        })
    }

    /// Every pending refund, newest first, with the sponsor's display name
    pub fn list_pending_refunds(&self) -> Vec<PendingRefund> {
        self.transactions
            .pending_of_type(FundTransactionType::Refund)
            .into_iter()
            .map(|transaction| {
                let sponsor_name = self
                    .ledgers
                    .get(transaction.sponsor_id)
                    .map(|ledger| ledger.display_name);
                PendingRefund {
                    transaction,
                    sponsor_name,
                }
            })
            .collect()
    }

    /// Credit the actor's ledger and record a confirmed deposit
    ///
    /// # Errors
    ///
    /// - `Validation` if `amount <= 0`
    /// - `ArithmeticOverflow` if the balance would overflow
    pub fn deposit_funds(&self, actor: &str, request: DepositRequest) -> CsrResult<DepositReceipt> {
        ensure_positive(request.amount)?;

        let sponsor_id = self.ledgers.resolve(actor)?.ledger().id;

        let now = Utc::now();
        let mut transaction =
            FundTransaction::pending(sponsor_id, FundTransactionType::Deposit, request.amount, actor);
        transaction.status = TransactionStatus::Confirmed;
        transaction.allocated_at = Some(now);
        transaction.proof_url = request.proof_url;
        if let Some(note) = &request.note {
            transaction
                .metadata
                .insert(METADATA_PROCESSED_NOTE.to_string(), note.clone());
        }

        let (sponsor, ()) = self.ledgers.update(sponsor_id, |ledger| {
            apply_credit(ledger, transaction.amount)?;
            self.transactions.insert(transaction.clone())
        })?;

        debug!(
            tx = %transaction.id,
            sponsor = %sponsor.id,
            amount = %transaction.amount,
            "deposit recorded"
        );

        self.audit.record_best_effort(
            NewAuditEntry::new(actor, ACTION_DEPOSIT_FUNDS)
                .role(ActorRole::Csr)
                .resource(RESOURCE_FUND_TRANSACTION, transaction.id)
                .metadata(json!({
                    "amount": transaction.amount,
                    "note": request.note,
                })),
        );

        Ok(DepositReceipt {
            transaction,
            sponsor,
        })
    }

    pub fn get_transaction(&self, id: TransactionId) -> CsrResult<FundTransaction> {
        self.transactions
            .get(id)
            .ok_or_else(|| CsrError::not_found("FundTransaction", id))
    }

    /// Transactions recorded against one sponsor, newest first
    pub fn transactions_for_sponsor(&self, sponsor_id: SponsorId) -> Vec<FundTransaction> {
        self.transactions.for_sponsor(sponsor_id)
    }
}

fn ensure_positive(amount: Decimal) -> CsrResult<()> {
    if amount <= Decimal::ZERO {
        return Err(CsrError::validation("amount must be greater than zero"));
    }
    Ok(())
}
