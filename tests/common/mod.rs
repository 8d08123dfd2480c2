#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use egrul_crawler_lib::{PageSession, RawResultBlock, RetryPolicy, TransportError};

/// State shared by a scripted session and every session recreated from it.
#[derive(Default)]
pub struct Script {
    /// Result pages per query.
    pub results: HashMap<String, Vec<Vec<RawResultBlock>>>,
    /// Page count reported by the pager; derived from `results` when unset.
    pub declared_pages: Option<u32>,
    /// Searches for these queries always time out.
    pub failing_queries: HashSet<String>,
    /// The next N page navigations time out.
    pub navigation_failures: u32,
    /// One-shot failures keyed by target page.
    pub navigation_faults: HashMap<u32, TransportError>,
    /// One-shot failures keyed by the 1-based number of the result read.
    pub read_faults: HashMap<u32, TransportError>,
    pub responsive: bool,

    pub current_query: Option<String>,
    pub current_page: u32,
    pub searches: Vec<String>,
    pub block_reads: u32,
    pub total_page_reads: u32,
    pub recreates: u32,
    pub extracts: Vec<(String, usize)>,
}

#[derive(Clone)]
pub struct ScriptedSession {
    pub script: Rc<RefCell<Script>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        let script = Script {
            responsive: true,
            ..Default::default()
        };
        ScriptedSession {
            script: Rc::new(RefCell::new(script)),
        }
    }

    pub fn with_results(self, query: &str, pages: Vec<Vec<RawResultBlock>>) -> Self {
        self.script.borrow_mut().results.insert(query.to_string(), pages);
        self
    }

    /// Put the session on page 1 of `query` without going through a search.
    pub fn show(&self, query: &str) {
        let mut script = self.script.borrow_mut();
        script.current_query = Some(query.to_string());
        script.current_page = 1;
    }

    fn pages(script: &Script) -> Vec<Vec<RawResultBlock>> {
        script
            .current_query
            .as_ref()
            .and_then(|q| script.results.get(q))
            .cloned()
            .unwrap_or_default()
    }
}

impl PageSession for ScriptedSession {
    fn submit_search(&mut self, query: &str) -> Result<(), TransportError> {
        let mut script = self.script.borrow_mut();
        script.searches.push(query.to_string());
        if script.failing_queries.contains(query) {
            return Err(TransportError::Timeout(format!("search for {}", query)));
        }
        script.current_query = Some(query.to_string());
        script.current_page = 1;
        Ok(())
    }

    fn navigate_to_page(&mut self, page: u32) -> Result<bool, TransportError> {
        let mut script = self.script.borrow_mut();
        if script.navigation_failures > 0 {
            script.navigation_failures -= 1;
            return Err(TransportError::Timeout(format!("page {}", page)));
        }
        if let Some(fault) = script.navigation_faults.remove(&page) {
            return Err(fault);
        }
        if page as usize <= Self::pages(&script).len() {
            script.current_page = page;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn read_result_blocks(&mut self) -> Result<Vec<RawResultBlock>, TransportError> {
        let mut script = self.script.borrow_mut();
        script.block_reads += 1;
        let read = script.block_reads;
        if let Some(fault) = script.read_faults.remove(&read) {
            return Err(fault);
        }
        let index = script.current_page.saturating_sub(1) as usize;
        Ok(Self::pages(&script).get(index).cloned().unwrap_or_default())
    }

    fn read_total_pages(&mut self) -> Result<Option<u32>, TransportError> {
        let mut script = self.script.borrow_mut();
        script.total_page_reads += 1;
        if let Some(declared) = script.declared_pages {
            return Ok(Some(declared));
        }
        let count = Self::pages(&script).len() as u32;
        Ok(if count > 1 { Some(count) } else { None })
    }

    fn request_extract(&mut self, index: usize) -> Result<bool, TransportError> {
        let mut script = self.script.borrow_mut();
        let query = script.current_query.clone().unwrap_or_default();
        script.extracts.push((query, index));
        Ok(true)
    }

    fn is_responsive(&mut self) -> bool {
        self.script.borrow().responsive
    }

    fn recreate(&self) -> Result<Self, TransportError> {
        let mut script = self.script.borrow_mut();
        script.recreates += 1;
        script.responsive = true;
        script.current_query = None;
        script.current_page = 0;
        Ok(self.clone())
    }
}

pub fn legal_block(i: u64) -> RawResultBlock {
    RawResultBlock::new(
        format!("ООО \"КОМПАНИЯ {}\"", i),
        format!(
            "г.Москва, ОГРН: {:013}, ИНН: {:010}, КПП: 773601001, ГЕНЕРАЛЬНЫЙ ДИРЕКТОР: Иванов Иван {}",
            1027700000000u64 + i,
            7707000000u64 + i,
            i
        ),
    )
}

pub fn entrepreneur_block(i: u64) -> RawResultBlock {
    RawResultBlock::new(
        format!("Петров Петр {}", i),
        format!("Тверская область, ОГРНИП: {:015}, ИНН: 690600170925", 305690610400000u64 + i),
    )
}

pub fn unrecognized_block() -> RawResultBlock {
    RawResultBlock::new("Неизвестно", "Сведения недоступны")
}

pub fn legal_pages(pages: usize, per_page: usize) -> Vec<Vec<RawResultBlock>> {
    (0..pages)
        .map(|p| (0..per_page).map(|i| legal_block((p * per_page + i) as u64)).collect())
        .collect()
}

pub fn session_lost() -> TransportError {
    TransportError::SessionLost("invalid session id".to_string())
}

pub fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        backoff: Duration::ZERO,
        ..RetryPolicy::default()
    }
}
