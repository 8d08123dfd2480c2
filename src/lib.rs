pub mod browser;
pub mod classifier;
pub mod cli;
pub mod collector;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod extract_parser;
pub mod extractor;
pub mod input_loader;
pub mod logger;
pub mod output;
pub mod pagination;
pub mod pdf;
pub mod records;
pub mod results_page;
pub mod resume_manager;
pub mod runner;
pub mod session;

// Exporting types for convenience
pub use classifier::{Kind, RecordClassifier};
pub use collector::{PageHarvest, PageResultCollector};
pub use config::CrawlConfig;
pub use error::{CrawlError, TransportError};
pub use extractor::Extractor;
pub use pagination::{CrawlBudget, PaginationController};
pub use records::{EntrepreneurRecord, LegalEntityRecord, LegalStatus, RawResultBlock, Record};
pub use resume_manager::ProgressState;
pub use runner::{CrawlOutcome, PdfSink, QueryRunner, RecordSink, RunStats};
pub use session::{PageSession, RetryPolicy, SessionHealthManager, SessionState};
