//! Fund transaction storage
//!
//! This module provides the `FundTransactionStore`, a thread-safe record of
//! every fund transaction keyed by id.
//!
//! # Status Transitions
//!
//! The only transition is `Pending -> Confirmed`, and it is exposed solely as
//! a conditional update ([`FundTransactionStore::confirm_pending`]): the
//! status is checked and set under the transaction's entry lock, so of two
//! concurrent confirmations exactly one succeeds.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Reverse;

use crate::types::transaction::METADATA_PROCESSED_NOTE;
use crate::types::{
    CsrError, CsrResult, FundTransaction, FundTransactionType, SponsorId, TransactionId,
    TransactionStatus,
};

/// Thread-safe fund transaction store
#[derive(Debug, Default)]
pub struct FundTransactionStore {
    transactions: DashMap<TransactionId, FundTransaction>,
}

impl FundTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a new transaction
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if a transaction with the same id exists;
    /// stored transactions are never overwritten.
    pub fn insert(&self, transaction: FundTransaction) -> CsrResult<()> {
        let id = transaction.id;
        let mut inserted = false;

        self.transactions.entry(id).or_insert_with(|| {
            inserted = true;
            transaction
        });

        if inserted {
            Ok(())
        } else {
            Err(CsrError::storage(format!(
                "fund transaction {} already exists",
                id
            )))
        }
    }

    /// Get a snapshot of a transaction by id
    pub fn get(&self, id: TransactionId) -> Option<FundTransaction> {
        self.transactions.get(&id).map(|entry| entry.value().clone())
    }

    /// Confirm a transaction if, and only if, it is still pending
    ///
    /// Equivalent to `UPDATE ... SET status = confirmed WHERE id = ? AND
    /// status = pending` with a check that one row was affected.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the id is unknown
    /// - `InvalidState` if the transaction is not pending any more
    pub fn confirm_pending(
        &self,
        id: TransactionId,
        approved_by: &str,
        note: Option<&str>,
        confirmed_at: DateTime<Utc>,
    ) -> CsrResult<FundTransaction> {
        let mut entry = self
            .transactions
            .get_mut(&id)
            .ok_or_else(|| CsrError::not_found("FundTransaction", id))?;

        let tx = entry.value_mut();
        if tx.status != TransactionStatus::Pending {
            return Err(CsrError::invalid_state(id, tx.status));
        }

        tx.status = TransactionStatus::Confirmed;
        tx.approved_by = Some(approved_by.to_string());
        tx.allocated_at = Some(confirmed_at);
        tx.updated_at = confirmed_at;
        if let Some(note) = note {
            tx.metadata
                .insert(METADATA_PROCESSED_NOTE.to_string(), note.to_string());
        }

        Ok(tx.clone())
    }

    /// Pending transactions of one type, newest first
    pub fn pending_of_type(&self, tx_type: FundTransactionType) -> Vec<FundTransaction> {
        self.collect_newest_first(|tx| tx.tx_type == tx_type && tx.is_pending())
    }

    /// Every transaction recorded against a sponsor, newest first
    pub fn for_sponsor(&self, sponsor_id: SponsorId) -> Vec<FundTransaction> {
        self.collect_newest_first(|tx| tx.sponsor_id == sponsor_id)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    fn collect_newest_first<P>(&self, predicate: P) -> Vec<FundTransaction>
    where
        P: Fn(&FundTransaction) -> bool,
    {
        let mut matching: Vec<FundTransaction> = self
            .transactions
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(|tx| (Reverse(tx.created_at), tx.id));
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::thread;

    fn refund(sponsor: SponsorId, amount: i64) -> FundTransaction {
        FundTransaction::pending(
            sponsor,
            FundTransactionType::Refund,
            Decimal::new(amount, 2),
            "csr-1",
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = FundTransactionStore::new();
        let tx = refund(SponsorId::generate(), 30000);

        store.insert(tx.clone()).unwrap();
        assert_eq!(store.get(tx.id), Some(tx));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_duplicate_is_rejected() {
        let store = FundTransactionStore::new();
        let tx = refund(SponsorId::generate(), 30000);

        store.insert(tx.clone()).unwrap();
        let mut changed = tx.clone();
        changed.amount = Decimal::ONE;

        assert!(matches!(store.insert(changed), Err(CsrError::Storage { .. })));
        assert_eq!(store.get(tx.id).unwrap().amount, Decimal::new(30000, 2));
    }

    #[test]
    fn test_confirm_pending_sets_confirmation_fields() {
        let store = FundTransactionStore::new();
        let tx = refund(SponsorId::generate(), 30000);
        store.insert(tx.clone()).unwrap();

        let now = Utc::now();
        let confirmed = store
            .confirm_pending(tx.id, "admin-1", Some("approved"), now)
            .unwrap();

        assert_eq!(confirmed.status, TransactionStatus::Confirmed);
        assert_eq!(confirmed.approved_by.as_deref(), Some("admin-1"));
        assert_eq!(confirmed.allocated_at, Some(now));
        assert_eq!(confirmed.metadata_value(METADATA_PROCESSED_NOTE), Some("approved"));
        assert_eq!(store.get(tx.id), Some(confirmed));
    }

    #[test]
    fn test_confirm_twice_fails_with_invalid_state() {
        let store = FundTransactionStore::new();
        let tx = refund(SponsorId::generate(), 30000);
        store.insert(tx.clone()).unwrap();

        store.confirm_pending(tx.id, "admin-1", None, Utc::now()).unwrap();
        let second = store.confirm_pending(tx.id, "admin-2", None, Utc::now());

        assert!(matches!(
            second,
            Err(CsrError::InvalidState { status: TransactionStatus::Confirmed, .. })
        ));
        assert_eq!(store.get(tx.id).unwrap().approved_by.as_deref(), Some("admin-1"));
    }

    #[test]
    fn test_confirm_unknown_fails_with_not_found() {
        let store = FundTransactionStore::new();
        let result = store.confirm_pending(TransactionId::generate(), "admin-1", None, Utc::now());
        assert!(matches!(result, Err(CsrError::NotFound { .. })));
    }

    #[test]
    fn test_concurrent_confirmations_only_one_wins() {
        let store = Arc::new(FundTransactionStore::new());
        let tx = refund(SponsorId::generate(), 30000);
        store.insert(tx.clone()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store
                        .confirm_pending(tx.id, &format!("admin-{}", i), None, Utc::now())
                        .is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_pending_of_type_newest_first() {
        let store = FundTransactionStore::new();
        let sponsor = SponsorId::generate();

        let mut older = refund(sponsor, 100);
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = refund(sponsor, 200);
        let mut deposit = refund(sponsor, 300);
        deposit.tx_type = FundTransactionType::Deposit;
        let confirmed = refund(sponsor, 400);

        for tx in [older.clone(), newer.clone(), deposit, confirmed.clone()] {
            store.insert(tx).unwrap();
        }
        store
            .confirm_pending(confirmed.id, "admin-1", None, Utc::now())
            .unwrap();

        let pending = store.pending_of_type(FundTransactionType::Refund);
        let ids: Vec<TransactionId> = pending.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn test_for_sponsor_filters_by_sponsor() {
        let store = FundTransactionStore::new();
        let a = SponsorId::generate();
        let b = SponsorId::generate();

        store.insert(refund(a, 100)).unwrap();
        store.insert(refund(b, 200)).unwrap();
        store.insert(refund(a, 300)).unwrap();

        assert_eq!(store.for_sponsor(a).len(), 2);
        assert_eq!(store.for_sponsor(b).len(), 1);
    }
}
