//! Invoice generation
//!
//! Builds invoices, proformas and credit notes, numbers them through an
//! injected [`InvoiceNumberGenerator`] and keeps them in an in-memory store
//! that rejects duplicate numbers. Nothing here touches a sponsor ledger.

use chrono::{DateTime, Datelike, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::config::InvoiceConfig;
use crate::core::traits::InvoiceNumberGenerator;
use crate::types::{
    CreateInvoice, CsrError, CsrResult, Invoice, InvoiceDocument, InvoiceDocumentMetadata,
    InvoiceId, InvoiceStatus, InvoiceTotals, InvoiceType, LineItem, LineItemInput, TaxBreakdown,
};

/// Metadata key naming the kind of document an invoice was issued as
pub const METADATA_DOCUMENT: &str = "document";

const DEFAULT_DESCRIPTION: &str = "CSR contribution";

/// Per-year sequential invoice numbers: `<prefix>-<year>-<sequence:04>`
///
/// The sequence restarts at 1 every calendar year and widens past four
/// digits instead of wrapping.
#[derive(Debug)]
pub struct SequentialInvoiceNumbers {
    prefix: String,
    counters: DashMap<i32, u32>,
}

impl SequentialInvoiceNumbers {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counters: DashMap::new(),
        }
    }
}

impl InvoiceNumberGenerator for SequentialInvoiceNumbers {
    fn next_number(&self, issued_at: DateTime<Utc>) -> String {
        let year = issued_at.year();
        let mut counter = self.counters.entry(year).or_insert(0);
        *counter += 1;
        format!("{}-{}-{:04}", self.prefix, year, *counter)
    }
}

/// Invoice storage with a unique index on the invoice number
#[derive(Debug, Default)]
pub struct InvoiceStore {
    invoices: DashMap<InvoiceId, Invoice>,
    numbers: DashMap<String, InvoiceId>,
}

impl InvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a new invoice
    ///
    /// # Errors
    ///
    /// `DuplicateInvoiceNumber` if the number is already taken.
    pub fn insert(&self, invoice: Invoice) -> CsrResult<()> {
        let mut claimed = false;
        self.numbers
            .entry(invoice.invoice_number.clone())
            .or_insert_with(|| {
                claimed = true;
                invoice.id
            });

        if !claimed {
            return Err(CsrError::duplicate_invoice_number(&invoice.invoice_number));
        }

        self.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    pub fn get(&self, id: InvoiceId) -> Option<Invoice> {
        self.invoices.get(&id).map(|entry| entry.value().clone())
    }

    /// Apply `f` to a stored invoice under its entry lock
    pub fn update<F>(&self, id: InvoiceId, f: F) -> CsrResult<Invoice>
    where
        F: FnOnce(&mut Invoice) -> CsrResult<()>,
    {
        let mut entry = self
            .invoices
            .get_mut(&id)
            .ok_or_else(|| CsrError::not_found("Invoice", id))?;

        let mut draft = entry.value().clone();
        f(&mut draft)?;
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    pub fn all(&self) -> Vec<Invoice> {
        self.invoices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.invoices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invoices.is_empty()
    }
}

/// Price line items and total them up
///
/// Each line's total is `quantity * unit_price` and its tax is
/// `total * tax_rate / 100`, both rounded to cents (half away from zero).
/// The breakdown has one entry per distinct rate, in ascending rate order.
///
/// # Errors
///
/// `Validation` for an empty item list, a blank description, a non-positive
/// quantity, a negative price or rate, a negative discount, a discount above
/// `subtotal + tax`, or amounts too large to represent.
pub fn calculate_totals(items: &[LineItemInput], discount: Decimal) -> CsrResult<InvoiceTotals> {
    if items.is_empty() {
        return Err(CsrError::validation("invoice needs at least one line item"));
    }
    if discount < Decimal::ZERO {
        return Err(CsrError::validation("discount cannot be negative"));
    }

    let mut line_items = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    let mut tax_amount = Decimal::ZERO;
    let mut by_rate: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();

    for item in items {
        validate_line(item)?;

        let total = money(
            item.quantity
                .checked_mul(item.unit_price)
                .ok_or_else(too_large)?,
        );
        let tax = money(
            total
                .checked_mul(item.tax_rate)
                .and_then(|taxed| taxed.checked_div(Decimal::ONE_HUNDRED))
                .ok_or_else(too_large)?,
        );

        subtotal = subtotal.checked_add(total).ok_or_else(too_large)?;
        tax_amount = tax_amount.checked_add(tax).ok_or_else(too_large)?;

        let bucket = by_rate
            .entry(item.tax_rate)
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        bucket.0 = bucket.0.checked_add(total).ok_or_else(too_large)?;
        bucket.1 = bucket.1.checked_add(tax).ok_or_else(too_large)?;

        line_items.push(LineItem {
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total,
            tax_rate: item.tax_rate,
            tax_amount: tax,
            category: item.category.clone(),
        });
    }

    let gross = subtotal.checked_add(tax_amount).ok_or_else(too_large)?;
    if discount > gross {
        return Err(CsrError::validation(format!(
            "discount {} exceeds invoice total {}",
            discount, gross
        )));
    }
    let discount_amount = money(discount);

    let tax_breakdown = by_rate
        .into_iter()
        .map(|(rate, (taxable_amount, tax_amount))| TaxBreakdown {
            rate,
            taxable_amount,
            tax_amount,
        })
        .collect();

    Ok(InvoiceTotals {
        line_items,
        subtotal,
        tax_amount,
        discount_amount,
        total_amount: gross - discount_amount,
        tax_breakdown,
    })
}

fn validate_line(item: &LineItemInput) -> CsrResult<()> {
    if item.description.trim().is_empty() {
        return Err(CsrError::validation("line item description is required"));
    }
    if item.quantity <= Decimal::ZERO {
        return Err(CsrError::validation("line item quantity must be greater than zero"));
    }
    if item.unit_price < Decimal::ZERO {
        return Err(CsrError::validation("line item unit price cannot be negative"));
    }
    if item.tax_rate < Decimal::ZERO {
        return Err(CsrError::validation("line item tax rate cannot be negative"));
    }
    Ok(())
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn too_large() -> CsrError {
    CsrError::validation("invoice amount is too large")
}

/// Creates and serves invoices
pub struct InvoiceGenerator {
    store: InvoiceStore,
    numbers: Arc<dyn InvoiceNumberGenerator>,
    config: InvoiceConfig,
}

impl InvoiceGenerator {
    pub fn new(config: InvoiceConfig, numbers: Arc<dyn InvoiceNumberGenerator>) -> Self {
        Self {
            store: InvoiceStore::new(),
            numbers,
            config,
        }
    }

    /// Generator numbering invoices with [`SequentialInvoiceNumbers`]
    pub fn with_sequential_numbers(config: InvoiceConfig) -> Self {
        let numbers = Arc::new(SequentialInvoiceNumbers::new(&config.number_prefix));
        Self::new(config, numbers)
    }

    /// Build, total and persist an invoice
    ///
    /// Without explicit line items a single line is built from `amount`,
    /// `description` and `tax_rate` (the configured default rate when
    /// unset). Type defaults to `payment_invoice` and status to `draft`.
    ///
    /// # Errors
    ///
    /// - `Validation` for missing amounts or bad line items (see [`calculate_totals`])
    /// - `DuplicateInvoiceNumber` if the number is already taken
    pub fn create_invoice(&self, input: CreateInvoice) -> CsrResult<Invoice> {
        let items = if input.line_items.is_empty() {
            let amount = input
                .amount
                .ok_or_else(|| CsrError::validation("amount or line items are required"))?;
            vec![LineItemInput {
                description: input
                    .description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                quantity: Decimal::ONE,
                unit_price: amount,
                tax_rate: input.tax_rate.unwrap_or(self.config.default_tax_rate),
                category: None,
            }]
        } else {
            input.line_items
        };

        let totals = calculate_totals(&items, input.discount_amount.unwrap_or(Decimal::ZERO))?;

        let now = Utc::now();
        let invoice_number = match input.invoice_number {
            Some(number) if number.trim().is_empty() => {
                return Err(CsrError::validation("invoice number cannot be blank"));
            }
            Some(number) => number,
            None => self.numbers.next_number(now),
        };
        let status = input.status.unwrap_or(InvoiceStatus::Draft);
        let due_date = match input.due_date {
            Some(date) => date,
            None => now
                .checked_add_signed(Duration::days(i64::from(self.config.due_days)))
                .ok_or_else(|| {
                    CsrError::validation(format!(
                        "due date {} days after issue is out of range",
                        self.config.due_days
                    ))
                })?
                .date_naive(),
        };

        let invoice = Invoice {
            id: InvoiceId::generate(),
            invoice_number,
            invoice_type: input.invoice_type.unwrap_or(InvoiceType::PaymentInvoice),
            status,
            payment_id: input.payment_id,
            organization_id: input.organization_id,
            sponsor_id: input.sponsor_id,
            line_items: totals.line_items,
            subtotal: totals.subtotal,
            tax_amount: totals.tax_amount,
            discount_amount: totals.discount_amount,
            total_amount: totals.total_amount,
            tax_breakdown: totals.tax_breakdown,
            issue_date: now,
            due_date: Some(due_date),
            sent_at: (status == InvoiceStatus::Sent).then_some(now),
            metadata: input.metadata,
            created_at: now,
        };

        self.store.insert(invoice.clone())?;
        info!(
            invoice = %invoice.invoice_number,
            total = %invoice.total_amount,
            "invoice created"
        );
        Ok(invoice)
    }

    /// Proforma invoice, a draft quote ahead of payment
    pub fn create_proforma_invoice(&self, input: CreateInvoice) -> CsrResult<Invoice> {
        self.create_variant(input, InvoiceType::Proforma, InvoiceStatus::Draft, "proforma")
    }

    /// Tax invoice for a received payment, issued as sent
    pub fn create_tax_invoice(&self, input: CreateInvoice) -> CsrResult<Invoice> {
        self.create_variant(input, InvoiceType::PaymentInvoice, InvoiceStatus::Sent, "tax_invoice")
    }

    /// Utilization certificate, issued as a draft credit note
    pub fn create_utilization_certificate(&self, input: CreateInvoice) -> CsrResult<Invoice> {
        self.create_variant(
            input,
            InvoiceType::CreditNote,
            InvoiceStatus::Draft,
            "utilization_certificate",
        )
    }

    fn create_variant(
        &self,
        mut input: CreateInvoice,
        invoice_type: InvoiceType,
        default_status: InvoiceStatus,
        document: &str,
    ) -> CsrResult<Invoice> {
        input.invoice_type = Some(invoice_type);
        input.status.get_or_insert(default_status);
        input
            .metadata
            .entry(METADATA_DOCUMENT.to_string())
            .or_insert_with(|| document.to_string());
        self.create_invoice(input)
    }

    /// Placeholder document reference for an invoice
    ///
    /// No PDF is rendered; the URL only follows the published layout.
    pub fn generate_invoice_pdf(&self, id: InvoiceId) -> CsrResult<InvoiceDocument> {
        let invoice = self.get_invoice(id)?;

        Ok(InvoiceDocument {
            pdf_url: format!(
                "{}/{}.pdf",
                self.config.pdf_base_url.trim_end_matches('/'),
                invoice.invoice_number
            ),
            metadata: InvoiceDocumentMetadata {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number,
                total_amount: invoice.total_amount,
                status: invoice.status,
                generated_at: Utc::now(),
            },
        })
    }

    pub fn get_invoice(&self, id: InvoiceId) -> CsrResult<Invoice> {
        self.store
            .get(id)
            .ok_or_else(|| CsrError::not_found("Invoice", id))
    }

    /// Invoices of one organization (or all), newest issue date first
    pub fn list_invoices(&self, organization_id: Option<&str>) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .store
            .all()
            .into_iter()
            .filter(|invoice| {
                organization_id.map_or(true, |org| invoice.organization_id.as_deref() == Some(org))
            })
            .collect();
        invoices.sort_by(|a, b| {
            (Reverse(a.issue_date), &a.invoice_number).cmp(&(Reverse(b.issue_date), &b.invoice_number))
        });
        invoices
    }

    /// Move a draft invoice to sent
    ///
    /// # Errors
    ///
    /// - `NotFound` if the invoice does not exist
    /// - `Validation` if it was already sent
    pub fn mark_sent(&self, id: InvoiceId) -> CsrResult<Invoice> {
        self.store.update(id, |invoice| {
            if invoice.status == InvoiceStatus::Sent {
                return Err(CsrError::validation(format!(
                    "invoice {} was already sent",
                    invoice.invoice_number
                )));
            }
            invoice.status = InvoiceStatus::Sent;
            invoice.sent_at = Some(Utc::now());
            Ok(())
        })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
