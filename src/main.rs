use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{error, info};

use egrul_crawler_lib::browser::{ChromeSession, ChromeSettings};
use egrul_crawler_lib::cli::Cli;
use egrul_crawler_lib::extract_parser::ExtractParser;
use egrul_crawler_lib::output::CsvSink;
use egrul_crawler_lib::pdf::DownloadDirPdfSink;
use egrul_crawler_lib::{input_loader, logger};
use egrul_crawler_lib::{
    CrawlConfig, EntrepreneurRecord, LegalEntityRecord, ProgressState, QueryRunner, SessionHealthManager,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.log_level);
    info!("Starting EGRUL crawler...");

    let mut config = match &cli.config {
        Some(path) => CrawlConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => CrawlConfig::default(),
    };
    cli.apply(&mut config);
    config.validate()?;

    if cli.parse_only {
        return parse_extracts(&config);
    }

    // 1. Load queries
    let Some(input) = &cli.input else {
        bail!("--input is required unless --parse-only is given");
    };
    let queries = input_loader::load_queries(input, cli.query_column)
        .with_context(|| format!("reading queries from {}", input.display()))?;
    if queries.is_empty() {
        bail!("No valid queries found in {}", input.display());
    }

    // 2. Prepare output locations
    for path in [
        &config.output.legal_csv,
        &config.output.entrepreneur_csv,
        &config.output.progress_file,
        &config.output.extracts_csv,
    ] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let pdf_dir = match &config.output.pdf_dir {
        Some(dir) => {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            Some(fs::canonicalize(dir)?)
        }
        None => None,
    };

    // 3. Resume state
    let progress = if cli.fresh {
        ProgressState::fresh(&config.output.progress_file)
    } else {
        ProgressState::load(&config.output.progress_file)
    };

    // 4. Browser session
    let settings = ChromeSettings::from_config(&config, pdf_dir.clone());
    let session = ChromeSession::launch(&settings).context("starting the browser")?;
    let health = SessionHealthManager::new(session, config.retry.policy());

    let mut runner = QueryRunner::new(health, config.max_records)
        .with_pauses(config.delays.query, config.delays.search, config.delays.page)
        .with_legal_sink(Box::new(CsvSink::<LegalEntityRecord>::open(&config.output.legal_csv)?))
        .with_entrepreneur_sink(Box::new(CsvSink::<EntrepreneurRecord>::open(&config.output.entrepreneur_csv)?))
        .with_progress(progress);
    if let Some(dir) = pdf_dir {
        runner = runner.with_pdf_sink(Box::new(DownloadDirPdfSink::new(
            dir,
            Duration::from_secs(config.output.download_timeout_secs),
            config.output.max_unfinished,
        )));
    }

    // 5. Crawl
    let outcome = runner.run_all(&queries);
    let stats = outcome.stats;

    info!(
        "Crawl completed: {} legal entities, {} entrepreneurs",
        outcome.legal.len(),
        outcome.entrepreneurs.len()
    );
    info!(
        "Summary: {} succeeded, {} failed, {} skipped results, {} resumed",
        stats.succeeded, stats.failed, stats.skipped, stats.resumed
    );
    if stats.failed > 0 {
        error!("{} queries failed; re-run to retry them", stats.failed);
    }

    // 6. Parse downloaded extracts
    if cli.parse_extracts {
        parse_extracts(&config)?;
    }
    Ok(())
}

fn parse_extracts(config: &CrawlConfig) -> Result<()> {
    let Some(dir) = &config.output.pdf_dir else {
        bail!("Parsing extracts needs a PDF directory (--pdf-dir or output.pdf_dir)");
    };
    let output = &config.output.extracts_csv;
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let summary = ExtractParser::new()
        .process_dir(dir, output)
        .with_context(|| format!("parsing extracts in {}", dir.display()))?;
    info!(
        "Extracts: {} parsed, {} failed, written to {}",
        summary.parsed,
        summary.failed,
        output.display()
    );
    Ok(())
}
