use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::config::CrawlConfig;

#[derive(Parser, Debug)]
#[command(
    name = "egrul-crawler",
    version,
    about = "Collect legal entity and entrepreneur records from the EGRUL registry search"
)]
pub struct Cli {
    /// CSV or spreadsheet file with one search query (INN, OGRN or name) per row
    #[arg(short, long, required_unless_present = "parse_only")]
    pub input: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum records collected per query
    #[arg(long)]
    pub max_records: Option<usize>,

    /// Index of the query column (0 for the first column)
    #[arg(long)]
    pub query_column: Option<usize>,

    /// Directory for the output CSV files and the progress file
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Download registry extracts of active legal entities into this directory
    #[arg(long)]
    pub pdf_dir: Option<PathBuf>,

    /// Path to the Chrome binary
    #[arg(long)]
    pub chrome_path: Option<PathBuf>,

    /// Run Chrome without a window (default)
    #[arg(long, overrides_with = "no_headless")]
    pub headless: bool,

    /// Show the browser window
    #[arg(long, overrides_with = "headless")]
    pub no_headless: bool,

    /// Parse the downloaded extracts into a CSV after the crawl
    #[arg(long, requires = "pdf_dir")]
    pub parse_extracts: bool,

    /// Only parse the extracts already in --pdf-dir, without crawling
    #[arg(long, requires = "pdf_dir")]
    pub parse_only: bool,

    /// Ignore saved progress and process every query
    #[arg(long)]
    pub fresh: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut CrawlConfig) {
        if let Some(max) = self.max_records {
            config.max_records = max;
        }
        if let Some(dir) = &self.output_dir {
            config.relocate_outputs(dir);
        }
        if let Some(dir) = &self.pdf_dir {
            config.output.pdf_dir = Some(dir.clone());
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_path = Some(path.clone());
        }
        if self.headless {
            config.browser.headless = true;
        }
        if self.no_headless {
            config.browser.headless = false;
        }
    }
}
