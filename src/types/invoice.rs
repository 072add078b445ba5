//! Invoice and credit-note types
//!
//! Invoices give deposits, refunds and utilization certificates a paper
//! trail. They are generated next to the refund workflow, not inside it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::ledger::SponsorId;
use super::transaction::TransactionId;

/// Invoice identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub Uuid);

impl InvoiceId {
    pub fn generate() -> Self {
        InvoiceId(Uuid::new_v4())
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    PaymentInvoice,
    Proforma,
    CreditNote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
}

/// A priced line on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// `quantity * unit_price`, excluding tax
    pub total: Decimal,
    /// Percentage, e.g. `18` for 18 %
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub category: Option<String>,
}

/// Unpriced line item as supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub tax_rate: Decimal,
    pub category: Option<String>,
}

/// Tax collected at one rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
}

/// Result of the line-item totals routine
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceTotals {
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub tax_breakdown: Vec<TaxBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: InvoiceId,
    /// `CSR-INV-<year>-<sequence>` unless supplied by the caller
    pub invoice_number: String,
    #[serde(rename = "type")]
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    /// Fund transaction the invoice documents, if any
    pub payment_id: Option<TransactionId>,
    pub organization_id: Option<String>,
    pub sponsor_id: Option<SponsorId>,
    pub line_items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub tax_breakdown: Vec<TaxBreakdown>,
    pub issue_date: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub sent_at: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an invoice
///
/// When `line_items` is empty a single line is built from `amount`,
/// `description` and `tax_rate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateInvoice {
    pub invoice_number: Option<String>,
    pub invoice_type: Option<InvoiceType>,
    pub status: Option<InvoiceStatus>,
    pub payment_id: Option<TransactionId>,
    pub organization_id: Option<String>,
    pub sponsor_id: Option<SponsorId>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub tax_rate: Option<Decimal>,
    pub line_items: Vec<LineItemInput>,
    pub discount_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub metadata: BTreeMap<String, String>,
}

/// Rendered invoice reference returned by the download operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocument {
    pub pdf_url: String,
    pub metadata: InvoiceDocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDocumentMetadata {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub total_amount: Decimal,
    pub status: InvoiceStatus,
    pub generated_at: DateTime<Utc>,
}
