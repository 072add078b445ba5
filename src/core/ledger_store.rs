//! Sponsor ledger storage
//!
//! This module provides the `SponsorLedgerStore`, a thread-safe store of
//! sponsor ledgers keyed by ledger id with a secondary index by owner.
//!
//! The store is responsible for:
//! - Find-or-create resolution of a ledger for an actor
//! - Atomic read-modify-write of a single ledger
//! - Enforcing `available_balance >= 0` on every committed mutation
//!
//! # Thread Safety
//!
//! Both maps are `DashMap`s. A mutation through [`SponsorLedgerStore::update`]
//! holds the ledger's entry lock for the whole closure, so work done inside
//! the closure is serialized against every other mutation of the same ledger.

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{ActorId, CsrError, CsrResult, LedgerResolution, SponsorId, SponsorLedger};

/// Thread-safe store of sponsor ledgers
#[derive(Debug, Default)]
pub struct SponsorLedgerStore {
    /// Ledgers by id
    ledgers: DashMap<SponsorId, SponsorLedger>,

    /// Owner actor to ledger id
    owners: DashMap<ActorId, SponsorId>,
}

impl SponsorLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the ledger of `owner`, creating an empty one on first touch
    ///
    /// Concurrent first-touch calls for the same owner create exactly one
    /// ledger; every caller after the first sees `Found`.
    pub fn resolve(&self, owner: &str) -> CsrResult<LedgerResolution> {
        let mut created: Option<SponsorLedger> = None;

        let sponsor_id = *self
            .owners
            .entry(owner.to_string())
            .or_insert_with(|| {
                let ledger = SponsorLedger::new(owner);
                let id = ledger.id;
                self.ledgers.insert(id, ledger.clone());
                created = Some(ledger);
                id
            })
            .value();

        if let Some(ledger) = created {
            debug!(owner, sponsor = %ledger.id, "created sponsor ledger");
            return Ok(LedgerResolution::Created(ledger));
        }

        self.ledgers
            .get(&sponsor_id)
            .map(|entry| LedgerResolution::Found(entry.value().clone()))
            .ok_or_else(|| {
                CsrError::storage(format!(
                    "owner index points at missing ledger {} for {}",
                    sponsor_id, owner
                ))
            })
    }

    /// Get a snapshot of a ledger by id
    pub fn get(&self, id: SponsorId) -> Option<SponsorLedger> {
        self.ledgers.get(&id).map(|entry| entry.value().clone())
    }

    /// Atomically mutate one ledger
    ///
    /// The closure works on a draft copy. The draft is committed only when
    /// the closure succeeds and the available balance is still non-negative,
    /// so a failed closure leaves the ledger untouched.
    ///
    /// # Returns
    ///
    /// The committed ledger together with the closure's own result.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no ledger has this id
    /// - `InsufficientBalance` if the draft's available balance went negative
    /// - whatever the closure returns
    pub fn update<F, R>(&self, id: SponsorId, f: F) -> CsrResult<(SponsorLedger, R)>
    where
        F: FnOnce(&mut SponsorLedger) -> CsrResult<R>,
    {
        let mut entry = self
            .ledgers
            .get_mut(&id)
            .ok_or_else(|| CsrError::not_found("SponsorLedger", id))?;

        let mut draft = entry.value().clone();
        let output = f(&mut draft)?;

        if draft.available_balance < Decimal::ZERO {
            let requested = entry.available_balance - draft.available_balance;
            return Err(CsrError::insufficient_balance(
                id,
                entry.available_balance,
                requested,
            ));
        }

        draft.updated_at = Utc::now();
        *entry.value_mut() = draft.clone();

        Ok((draft, output))
    }

    /// Credit a ledger's available balance
    pub fn credit(&self, id: SponsorId, amount: Decimal) -> CsrResult<SponsorLedger> {
        self.update(id, |ledger| apply_credit(ledger, amount))
            .map(|(ledger, ())| ledger)
    }

    /// Rename the ledger as shown in admin listings
    pub fn set_display_name(&self, id: SponsorId, name: &str) -> CsrResult<SponsorLedger> {
        self.update(id, |ledger| {
            ledger.display_name = name.to_string();
            Ok(())
        })
        .map(|(ledger, ())| ledger)
    }

    /// Snapshot of every ledger, sorted by owner
    pub fn all(&self) -> Vec<SponsorLedger> {
        let mut ledgers: Vec<SponsorLedger> = self
            .ledgers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        ledgers.sort_by(|a, b| a.owner.cmp(&b.owner));
        ledgers
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

/// Add `amount` to the available balance with overflow checking
pub fn apply_credit(ledger: &mut SponsorLedger, amount: Decimal) -> CsrResult<()> {
    ledger.available_balance = ledger
        .available_balance
        .checked_add(amount)
        .ok_or_else(|| CsrError::arithmetic_overflow("credit", ledger.id))?;
    Ok(())
}

/// Subtract `amount` from the available balance
///
/// Fails with `InsufficientBalance` rather than letting the balance go
/// negative.
pub fn apply_debit(ledger: &mut SponsorLedger, amount: Decimal) -> CsrResult<()> {
    if ledger.available_balance < amount {
        return Err(CsrError::insufficient_balance(
            ledger.id,
            ledger.available_balance,
            amount,
        ));
    }

    ledger.available_balance = ledger
        .available_balance
        .checked_sub(amount)
        .ok_or_else(|| CsrError::arithmetic_overflow("debit", ledger.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_resolve_creates_then_finds() {
        let store = SponsorLedgerStore::new();

        let first = store.resolve("csr-1").unwrap();
        assert!(first.was_created());
        assert_eq!(first.ledger().available_balance, Decimal::ZERO);
        assert_eq!(first.ledger().committed_amount, Decimal::ZERO);

        let second = store.resolve("csr-1").unwrap();
        assert!(!second.was_created());
        assert_eq!(second.ledger().id, first.ledger().id);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_resolve_is_idempotent_under_concurrency() {
        let store = Arc::new(SponsorLedgerStore::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.resolve("csr-1").unwrap())
            })
            .collect();

        let results: Vec<LedgerResolution> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.was_created()).count(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_credit_increases_available() {
        let store = SponsorLedgerStore::new();
        let id = store.resolve("csr-1").unwrap().ledger().id;

        let ledger = store.credit(id, Decimal::new(100000, 2)).unwrap();
        assert_eq!(ledger.available_balance, Decimal::new(100000, 2));
        assert_eq!(store.get(id).unwrap().available_balance, Decimal::new(100000, 2));
    }

    #[test]
    fn test_update_unknown_ledger_fails() {
        let store = SponsorLedgerStore::new();
        let result = store.credit(SponsorId::generate(), Decimal::ONE);
        assert!(matches!(result, Err(CsrError::NotFound { .. })));
    }

    #[test]
    fn test_failed_closure_leaves_ledger_untouched() {
        let store = SponsorLedgerStore::new();
        let id = store.resolve("csr-1").unwrap().ledger().id;
        store.credit(id, Decimal::new(10000, 2)).unwrap();

        let result = store.update(id, |ledger| {
            ledger.available_balance = Decimal::ZERO;
            Err::<(), _>(CsrError::validation("abort"))
        });

        assert!(result.is_err());
        assert_eq!(store.get(id).unwrap().available_balance, Decimal::new(10000, 2));
    }

    #[test]
    fn test_update_rejects_negative_balance() {
        let store = SponsorLedgerStore::new();
        let id = store.resolve("csr-1").unwrap().ledger().id;

        let result = store.update(id, |ledger| {
            ledger.available_balance -= Decimal::ONE;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(CsrError::InsufficientBalance { requested, .. }) if requested == Decimal::ONE
        ));
        assert_eq!(store.get(id).unwrap().available_balance, Decimal::ZERO);
    }

    #[test]
    fn test_apply_debit_checks_balance() {
        let mut ledger = SponsorLedger::new("csr-1");
        ledger.available_balance = Decimal::new(5000, 2);

        assert!(matches!(
            apply_debit(&mut ledger, Decimal::new(5001, 2)),
            Err(CsrError::InsufficientBalance { .. })
        ));
        apply_debit(&mut ledger, Decimal::new(5000, 2)).unwrap();
        assert_eq!(ledger.available_balance, Decimal::ZERO);
    }

    #[test]
    fn test_apply_credit_overflow() {
        let mut ledger = SponsorLedger::new("csr-1");
        ledger.available_balance = Decimal::MAX;

        assert!(matches!(
            apply_credit(&mut ledger, Decimal::ONE),
            Err(CsrError::ArithmeticOverflow { .. })
        ));
    }

    #[test]
    fn test_all_sorted_by_owner() {
        let store = SponsorLedgerStore::new();
        store.resolve("csr-b").unwrap();
        store.resolve("csr-a").unwrap();
        store.resolve("csr-c").unwrap();

        let owners: Vec<String> = store.all().into_iter().map(|l| l.owner).collect();
        assert_eq!(owners, vec!["csr-a", "csr-b", "csr-c"]);
    }

    #[test]
    fn test_set_display_name() {
        let store = SponsorLedgerStore::new();
        let id = store.resolve("csr-1").unwrap().ledger().id;

        store.set_display_name(id, "Acme Foundation").unwrap();
        assert_eq!(store.get(id).unwrap().display_name, "Acme Foundation");
    }
}
