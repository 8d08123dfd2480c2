use log::{debug, info, warn};

use crate::collector::PageResultCollector;
use crate::delay_manager::PauseRange;
use crate::error::CrawlError;
use crate::records::Record;
use crate::session::{PageSession, SessionHealthManager};

/// Per-query record allowance. Collection stops once `max_records` records
/// have been admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlBudget {
    records_collected: usize,
    max_records: usize,
}

impl CrawlBudget {
    pub fn new(max_records: usize) -> Self {
        CrawlBudget {
            records_collected: 0,
            max_records,
        }
    }

    pub fn records_collected(&self) -> usize {
        self.records_collected
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn is_exhausted(&self) -> bool {
        self.records_collected >= self.max_records
    }

    /// Count one more record if there is room for it.
    pub fn admit(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }
        self.records_collected += 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    LastPage,
    BudgetReached,
    /// The next page link was missing.
    NoMorePages,
    /// Navigating to the next page kept failing; treated as end of results.
    NavigationFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageStep {
    Fetching(u32),
    Collecting(u32),
    Stop(StopReason),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationRun {
    pub records: Vec<Record>,
    pub skipped: usize,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

/// Walks result pages 1..N of the current search.
pub struct PaginationController {
    collector: PageResultCollector,
    page_pause: PauseRange,
}

impl PaginationController {
    pub fn new(collector: PageResultCollector, page_pause: PauseRange) -> Self {
        PaginationController { collector, page_pause }
    }

    /// Collect records page by page until the last page, the budget, or the
    /// end of navigable results. Page 1 must already be rendered.
    ///
    /// A session replaced mid-walk no longer shows this search, so the walk
    /// ends with [`CrawlError::SessionReplaced`] instead of reading the blank
    /// page of the new session.
    pub fn run<S: PageSession>(
        &self,
        health: &mut SessionHealthManager<S>,
        query: &str,
        budget: &mut CrawlBudget,
    ) -> Result<PaginationRun, CrawlError> {
        let mut records = Vec::new();
        let mut skipped = 0;
        let mut pages_visited = 0;
        let mut total_pages: Option<u32> = None;
        let mut step = PageStep::Fetching(1);
        let generation = health.generation();

        loop {
            step = match step {
                PageStep::Fetching(_) if budget.is_exhausted() => PageStep::Stop(StopReason::BudgetReached),
                PageStep::Fetching(1) => PageStep::Collecting(1),
                PageStep::Fetching(page) => {
                    self.page_pause.pause();
                    let navigation = health.with_session(|s| s.navigate_to_page(page));
                    ensure_same_session(health, generation, page)?;
                    match navigation {
                        Ok(true) => PageStep::Collecting(page),
                        Ok(false) => PageStep::Stop(StopReason::NoMorePages),
                        Err(e @ CrawlError::RecoveryFailed { .. }) => return Err(e),
                        Err(e) => {
                            warn!("Could not open page {} for {}: {}", page, query, e);
                            PageStep::Stop(StopReason::NavigationFailed)
                        }
                    }
                }
                PageStep::Collecting(page) => {
                    let harvest = match total_pages {
                        None => health.with_session(|s| self.collector.collect(s, query))?,
                        Some(_) => health.with_session(|s| self.collector.collect_blocks(s, query))?,
                    };
                    ensure_same_session(health, generation, page)?;
                    let total = *total_pages.get_or_insert(harvest.total_pages);
                    pages_visited += 1;
                    skipped += harvest.skipped;
                    debug!(
                        "Page {}/{} for {}: {} records, {} skipped",
                        page,
                        total,
                        query,
                        harvest.records.len(),
                        harvest.skipped
                    );

                    for record in harvest.records {
                        if !budget.admit() {
                            break;
                        }
                        records.push(record);
                        if budget.is_exhausted() {
                            break;
                        }
                    }

                    if budget.is_exhausted() {
                        PageStep::Stop(StopReason::BudgetReached)
                    } else if page >= total {
                        PageStep::Stop(StopReason::LastPage)
                    } else {
                        PageStep::Fetching(page + 1)
                    }
                }
                PageStep::Stop(stop_reason) => {
                    info!(
                        "Collected {} records from {} pages for {} ({:?})",
                        records.len(),
                        pages_visited,
                        query,
                        stop_reason
                    );
                    return Ok(PaginationRun {
                        records,
                        skipped,
                        pages_visited,
                        stop_reason,
                    });
                }
            };
        }
    }
}

fn ensure_same_session<S: PageSession>(
    health: &SessionHealthManager<S>,
    generation: u64,
    page: u32,
) -> Result<(), CrawlError> {
    if health.generation() == generation {
        Ok(())
    } else {
        warn!("Session was replaced while on page {}", page);
        Err(CrawlError::SessionReplaced { page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_admits_up_to_max() {
        let mut budget = CrawlBudget::new(2);
        assert!(budget.admit());
        assert!(budget.admit());
        assert!(!budget.admit());
        assert_eq!(budget.records_collected(), 2);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let mut budget = CrawlBudget::new(0);
        assert!(budget.is_exhausted());
        assert!(!budget.admit());
    }
}
