//! Engine configuration
//!
//! Settings that shape the fund engine itself, as opposed to how a journal
//! is read (see [`crate::strategy::BatchConfig`]). Built from CLI arguments
//! by [`crate::cli::CliArgs::to_engine_config`]; zero or blank values fall
//! back to the defaults with a warning.

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::audit_log::DEFAULT_AUDIT_LIMIT;

/// Invoice number prefix, giving `CSR-INV-<year>-<sequence>`
pub const DEFAULT_INVOICE_PREFIX: &str = "CSR-INV";

/// Base URL under which generated invoice documents are published
pub const DEFAULT_PDF_BASE_URL: &str = "https://files.csr.local/invoices";

/// Longest payment term accepted for invoices
pub const MAX_DUE_DAYS: u32 = 3650;

/// Configuration for the invoice generator
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceConfig {
    pub number_prefix: String,
    /// Percentage applied when a caller gives neither a rate nor line items
    pub default_tax_rate: Decimal,
    /// Days between issue date and due date when none is given
    pub due_days: u32,
    pub pdf_base_url: String,
}

impl Default for InvoiceConfig {
    fn default() -> Self {
        Self {
            number_prefix: DEFAULT_INVOICE_PREFIX.to_string(),
            default_tax_rate: Decimal::from(18),
            due_days: 30,
            pdf_base_url: DEFAULT_PDF_BASE_URL.to_string(),
        }
    }
}

/// Configuration for a [`crate::core::CsrEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Entries returned by an audit trail query without an explicit limit
    pub audit_trail_limit: usize,
    pub invoice: InvoiceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audit_trail_limit: DEFAULT_AUDIT_LIMIT,
            invoice: InvoiceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Build a config, replacing unusable values with defaults
    pub fn new(audit_trail_limit: usize, invoice: InvoiceConfig) -> Self {
        let default = Self::default();

        let audit_trail_limit = if audit_trail_limit == 0 {
            warn!(
                audit_trail_limit,
                default = default.audit_trail_limit,
                "invalid audit trail limit, using default"
            );
            default.audit_trail_limit
        } else {
            audit_trail_limit
        };

        Self {
            audit_trail_limit,
            invoice: invoice.sanitized(),
        }
    }
}

impl InvoiceConfig {
    fn sanitized(self) -> Self {
        let default = Self::default();

        let number_prefix = if self.number_prefix.trim().is_empty() {
            warn!(default = %default.number_prefix, "blank invoice prefix, using default");
            default.number_prefix
        } else {
            self.number_prefix
        };

        let default_tax_rate = if self.default_tax_rate < Decimal::ZERO {
            warn!(
                tax_rate = %self.default_tax_rate,
                default = %default.default_tax_rate,
                "negative tax rate, using default"
            );
            default.default_tax_rate
        } else {
            self.default_tax_rate
        };

        let pdf_base_url = if self.pdf_base_url.trim().is_empty() {
            warn!(default = %default.pdf_base_url, "blank PDF base URL, using default");
            default.pdf_base_url
        } else {
            self.pdf_base_url
        };

        let due_days = if self.due_days > MAX_DUE_DAYS {
            warn!(
                due_days = self.due_days,
                default = default.due_days,
                max = MAX_DUE_DAYS,
                "due days out of range, using default"
            );
            default.due_days
        } else {
            self.due_days
        };

        Self {
            number_prefix,
            default_tax_rate,
            due_days,
            pdf_base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.audit_trail_limit, 100);
        assert_eq!(config.invoice.number_prefix, "CSR-INV");
        assert_eq!(config.invoice.due_days, 30);
    }

    #[rstest]
    #[case::zero_limit(0, 100)]
    #[case::custom_limit(25, 25)]
    fn test_audit_limit_fallback(#[case] limit: usize, #[case] expected: usize) {
        let config = EngineConfig::new(limit, InvoiceConfig::default());
        assert_eq!(config.audit_trail_limit, expected);
    }

    #[test]
    fn test_invoice_values_fall_back() {
        let config = EngineConfig::new(
            10,
            InvoiceConfig {
                number_prefix: "  ".to_string(),
                default_tax_rate: Decimal::from(-1),
                due_days: 0,
                pdf_base_url: String::new(),
            },
        );

        assert_eq!(config.invoice.number_prefix, DEFAULT_INVOICE_PREFIX);
        assert_eq!(config.invoice.default_tax_rate, Decimal::from(18));
        assert_eq!(config.invoice.due_days, 0);
        assert_eq!(config.invoice.pdf_base_url, DEFAULT_PDF_BASE_URL);
    }

    #[rstest]
    #[case::longest_term(MAX_DUE_DAYS, MAX_DUE_DAYS)]
    #[case::beyond_longest_term(MAX_DUE_DAYS + 1, 30)]
    #[case::u32_max(u32::MAX, 30)]
    fn test_due_days_out_of_range_fall_back(#[case] due_days: u32, #[case] expected: u32) {
        let config = EngineConfig::new(
            10,
            InvoiceConfig {
                due_days,
                ..InvoiceConfig::default()
            },
        );

        assert_eq!(config.invoice.due_days, expected);
    }
}
