use log::{error, info, warn};

use crate::collector::PageResultCollector;
use crate::delay_manager::PauseRange;
use crate::error::{CrawlError, SinkError, TransportError};
use crate::pagination::{CrawlBudget, PaginationController};
use crate::records::{EntrepreneurRecord, LegalEntityRecord, LegalStatus, Record};
use crate::resume_manager::ProgressState;
use crate::session::{PageSession, SessionHealthManager};

/// Append-style destination for finished records.
pub trait RecordSink<R> {
    fn accept(&mut self, record: &R) -> Result<(), SinkError>;
}

impl<R: Clone> RecordSink<R> for Vec<R> {
    fn accept(&mut self, record: &R) -> Result<(), SinkError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Fetches the registry extract of an active legal entity and returns the
/// stored file name, or an empty string when nothing was saved.
pub trait PdfSink<S: PageSession> {
    fn fetch_pdf(
        &mut self,
        session: &mut S,
        inn: &str,
        entity_name: &str,
        status: LegalStatus,
    ) -> Result<String, TransportError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Result blocks dropped as unrecognized.
    pub skipped: usize,
    /// Queries already completed by an earlier run.
    pub resumed: usize,
}

#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub legal: Vec<LegalEntityRecord>,
    pub entrepreneurs: Vec<EntrepreneurRecord>,
    pub stats: RunStats,
}

struct QueryResult {
    legal: Vec<LegalEntityRecord>,
    entrepreneurs: Vec<EntrepreneurRecord>,
    skipped: usize,
}

pub struct QueryRunner<S: PageSession> {
    health: SessionHealthManager<S>,
    pagination: PaginationController,
    max_records: usize,
    query_pause: PauseRange,
    search_pause: PauseRange,
    legal_sink: Option<Box<dyn RecordSink<LegalEntityRecord>>>,
    entrepreneur_sink: Option<Box<dyn RecordSink<EntrepreneurRecord>>>,
    pdf_sink: Option<Box<dyn PdfSink<S>>>,
    progress: Option<ProgressState>,
}

impl<S: PageSession> QueryRunner<S> {
    pub fn new(health: SessionHealthManager<S>, max_records: usize) -> Self {
        QueryRunner {
            health,
            pagination: PaginationController::new(PageResultCollector::new(), PauseRange::NONE),
            max_records,
            query_pause: PauseRange::NONE,
            search_pause: PauseRange::NONE,
            legal_sink: None,
            entrepreneur_sink: None,
            pdf_sink: None,
            progress: None,
        }
    }

    pub fn with_pauses(mut self, query: PauseRange, search: PauseRange, page: PauseRange) -> Self {
        self.query_pause = query;
        self.search_pause = search;
        self.pagination = PaginationController::new(PageResultCollector::new(), page);
        self
    }

    pub fn with_legal_sink(mut self, sink: Box<dyn RecordSink<LegalEntityRecord>>) -> Self {
        self.legal_sink = Some(sink);
        self
    }

    pub fn with_entrepreneur_sink(mut self, sink: Box<dyn RecordSink<EntrepreneurRecord>>) -> Self {
        self.entrepreneur_sink = Some(sink);
        self
    }

    pub fn with_pdf_sink(mut self, sink: Box<dyn PdfSink<S>>) -> Self {
        self.pdf_sink = Some(sink);
        self
    }

    pub fn with_progress(mut self, progress: ProgressState) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn health(&self) -> &SessionHealthManager<S> {
        &self.health
    }

    /// Run every query in input order. A failing query is counted and the
    /// crawl moves on.
    pub fn run_all(&mut self, queries: &[String]) -> CrawlOutcome {
        let mut outcome = CrawlOutcome::default();
        let total = queries.len();
        let mut processed_count = 0;

        for (i, query) in queries.iter().enumerate() {
            if self.progress.as_ref().is_some_and(|p| p.contains(query)) {
                outcome.stats.resumed += 1;
                continue;
            }

            if processed_count > 0 {
                self.query_pause.pause();
            }
            processed_count += 1;
            info!("Processing {} / {} : {}", i + 1, total, query);

            match self.run_query(query) {
                Ok(result) => {
                    outcome.stats.succeeded += 1;
                    outcome.stats.skipped += result.skipped;
                    self.emit(&result);
                    outcome.legal.extend(result.legal);
                    outcome.entrepreneurs.extend(result.entrepreneurs);
                    if let Some(progress) = self.progress.as_mut() {
                        progress.mark_complete(query.clone());
                    }
                }
                Err(e) => {
                    error!("Query {} failed: {}", query, e);
                    outcome.stats.failed += 1;
                }
            }

            self.health.note_query_processed();
        }

        info!(
            "Summary: {} queries succeeded, {} failed, {} results skipped, {} already done",
            outcome.stats.succeeded, outcome.stats.failed, outcome.stats.skipped, outcome.stats.resumed
        );
        outcome
    }

    fn run_query(&mut self, query: &str) -> Result<QueryResult, CrawlError> {
        self.health.begin_query()?;

        // A replaced session lost the search, so the whole walk starts over
        // with a fresh budget.
        let max_walks = self.health.policy().max_attempts.max(1);
        let mut walk = 1;
        let run = loop {
            self.health.with_session(|s| s.submit_search(query))?;
            self.search_pause.pause();

            let mut budget = CrawlBudget::new(self.max_records);
            match self.pagination.run(&mut self.health, query, &mut budget) {
                Err(CrawlError::SessionReplaced { page }) if walk < max_walks => {
                    warn!(
                        "Session replaced on page {} of {}, searching again ({}/{})",
                        page, query, walk, max_walks
                    );
                    walk += 1;
                }
                other => break other?,
            }
        };

        let mut result = QueryResult {
            legal: Vec::new(),
            entrepreneurs: Vec::new(),
            skipped: run.skipped,
        };
        for record in run.records {
            match record {
                Record::Legal(mut legal) => {
                    legal.pdf_file = self.fetch_pdf(&legal);
                    result.legal.push(legal);
                }
                Record::Entrepreneur(entrepreneur) => result.entrepreneurs.push(entrepreneur),
            }
        }
        Ok(result)
    }

    fn fetch_pdf(&mut self, record: &LegalEntityRecord) -> String {
        let sink = match self.pdf_sink.as_mut() {
            Some(sink) => sink,
            None => return String::new(),
        };
        if record.is_liquidated() || record.inn.is_empty() {
            return String::new();
        }

        match self
            .health
            .with_session(|s| sink.fetch_pdf(s, &record.inn, &record.entity_name, record.status))
        {
            Ok(file) => file,
            Err(e) => {
                warn!("No extract saved for INN {}: {}", record.inn, e);
                String::new()
            }
        }
    }

    fn emit(&mut self, result: &QueryResult) {
        if let Some(sink) = self.legal_sink.as_mut() {
            for record in &result.legal {
                if let Err(e) = sink.accept(record) {
                    error!("Failed to write record for {}: {}", record.entity_name, e);
                }
            }
        }
        if let Some(sink) = self.entrepreneur_sink.as_mut() {
            for record in &result.entrepreneurs {
                if let Err(e) = sink.accept(record) {
                    error!("Failed to write record for {}: {}", record.entity_name, e);
                }
            }
        }
    }
}
