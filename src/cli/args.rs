use crate::config::{EngineConfig, InvoiceConfig};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

/// Replay a CSR fund journal and report sponsor ledgers
#[derive(Parser, Debug)]
#[command(name = "csr-fund-engine")]
#[command(about = "Replay a CSR fund journal and report sponsor ledgers", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing journal rows
    #[arg(value_name = "INPUT", help = "Path to the input journal CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy to use for the journal
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of journal rows per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of journal rows per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Worker threads for batch processing (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "audit-limit",
        value_name = "COUNT",
        help = "Default number of entries returned by an audit trail query (default: 100)"
    )]
    pub audit_limit: Option<usize>,

    #[arg(
        long = "invoice-prefix",
        value_name = "PREFIX",
        help = "Invoice number prefix (default: CSR-INV)"
    )]
    pub invoice_prefix: Option<String>,

    #[arg(
        long = "tax-rate",
        value_name = "PERCENT",
        help = "Tax rate applied to deposit invoices (default: 18)"
    )]
    pub tax_rate: Option<Decimal>,

    #[arg(
        long = "due-days",
        value_name = "DAYS",
        help = "Days until an invoice falls due (default: 30)"
    )]
    pub due_days: Option<u32>,

    #[arg(
        long = "pdf-base-url",
        value_name = "URL",
        help = "Base URL for generated invoice documents"
    )]
    pub pdf_base_url: Option<String>,

    /// Write every issued invoice as JSON to this path
    #[arg(long = "invoices", value_name = "PATH")]
    pub invoices_report: Option<PathBuf>,

    /// Write the full audit trail as JSON to this path
    #[arg(long = "audit", value_name = "PATH")]
    pub audit_report: Option<PathBuf>,
}

/// Available journal processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values take the defaults; zero values fall back to the
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EngineConfig from CLI arguments
    pub fn to_engine_config(&self) -> EngineConfig {
        let default = EngineConfig::default();
        let invoice = InvoiceConfig {
            number_prefix: self
                .invoice_prefix
                .clone()
                .unwrap_or(default.invoice.number_prefix),
            default_tax_rate: self.tax_rate.unwrap_or(default.invoice.default_tax_rate),
            due_days: self.due_days.unwrap_or(default.invoice.due_days),
            pdf_base_url: self
                .pdf_base_url
                .clone()
                .unwrap_or(default.invoice.pdf_base_url),
        };

        EngineConfig::new(
            self.audit_limit.unwrap_or(default.audit_trail_limit),
            invoice,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_INVOICE_PREFIX, DEFAULT_PDF_BASE_URL};
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_engine_config_defaults() {
        let config = CliArgs::try_parse_from(["program", "input.csv"])
            .unwrap()
            .to_engine_config();

        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_from_flags() {
        let config = CliArgs::try_parse_from([
            "program",
            "--audit-limit",
            "25",
            "--invoice-prefix",
            "ACME",
            "--tax-rate",
            "12.5",
            "--due-days",
            "45",
            "--pdf-base-url",
            "https://docs.example.org",
            "input.csv",
        ])
        .unwrap()
        .to_engine_config();

        assert_eq!(config.audit_trail_limit, 25);
        assert_eq!(config.invoice.number_prefix, "ACME");
        assert_eq!(config.invoice.default_tax_rate, Decimal::new(125, 1));
        assert_eq!(config.invoice.due_days, 45);
        assert_eq!(config.invoice.pdf_base_url, "https://docs.example.org");
    }

    #[rstest]
    #[case::zero_audit_limit(&["program", "--audit-limit", "0", "input.csv"])]
    #[case::blank_prefix(&["program", "--invoice-prefix", " ", "input.csv"])]
    #[case::blank_pdf_url(&["program", "--pdf-base-url", "", "input.csv"])]
    fn test_engine_config_unusable_values_fall_back(#[case] args: &[&str]) {
        let config = CliArgs::try_parse_from(args).unwrap().to_engine_config();

        assert_eq!(config.audit_trail_limit, 100);
        assert_eq!(config.invoice.number_prefix, DEFAULT_INVOICE_PREFIX);
        assert_eq!(config.invoice.pdf_base_url, DEFAULT_PDF_BASE_URL);
    }

    #[test]
    fn test_report_paths() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--invoices",
            "invoices.json",
            "--audit",
            "audit.json",
            "input.csv",
        ])
        .unwrap();

        assert_eq!(parsed.invoices_report, Some(PathBuf::from("invoices.json")));
        assert_eq!(parsed.audit_report, Some(PathBuf::from("audit.json")));
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_tax_rate(&["program", "--tax-rate", "lots", "input.csv"])]
    #[case::negative_due_days(&["program", "--due-days", "-3", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
