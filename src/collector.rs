use log::debug;

use crate::classifier::{Kind, RecordClassifier};
use crate::error::TransportError;
use crate::extractor::Extractor;
use crate::records::{EntrepreneurRecord, LegalEntityRecord, RawResultBlock, Record};
use crate::session::PageSession;

/// Records harvested from one rendered results page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageHarvest {
    pub records: Vec<Record>,
    /// Blocks that matched neither OGRN nor OGRNIP.
    pub skipped: usize,
    pub total_pages: u32,
}

pub struct PageResultCollector {
    classifier: RecordClassifier,
    extractor: Extractor,
}

impl Default for PageResultCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl PageResultCollector {
    pub fn new() -> Self {
        PageResultCollector {
            classifier: RecordClassifier::new(),
            extractor: Extractor::new(),
        }
    }

    /// Blocks of the current page plus its declared page count (1 when the
    /// page has no pager).
    pub fn collect<S: PageSession>(&self, session: &mut S, query: &str) -> Result<PageHarvest, TransportError> {
        let mut harvest = self.collect_blocks(session, query)?;
        harvest.total_pages = session.read_total_pages()?.unwrap_or(1).max(1);
        Ok(harvest)
    }

    /// Like [`collect`](Self::collect) without reading the pager. `total_pages`
    /// is left at 0.
    pub fn collect_blocks<S: PageSession>(&self, session: &mut S, query: &str) -> Result<PageHarvest, TransportError> {
        let blocks = session.read_result_blocks()?;
        Ok(self.harvest(blocks, query))
    }

    pub fn harvest(&self, blocks: Vec<RawResultBlock>, query: &str) -> PageHarvest {
        let mut harvest = PageHarvest::default();
        for block in blocks {
            match self.to_record(block, query) {
                Some(record) => harvest.records.push(record),
                None => harvest.skipped += 1,
            }
        }
        harvest
    }

    pub fn to_record(&self, block: RawResultBlock, query: &str) -> Option<Record> {
        let RawResultBlock { caption_text, body_text } = block;
        match self.classifier.classify(&body_text) {
            Kind::LegalEntity => Some(Record::Legal(LegalEntityRecord {
                search_query: query.to_string(),
                entity_name: caption_text,
                ..self.extractor.extract_legal(&body_text)
            })),
            Kind::Entrepreneur => Some(Record::Entrepreneur(EntrepreneurRecord {
                search_query: query.to_string(),
                entity_name: caption_text,
                ..self.extractor.extract_entrepreneur(&body_text)
            })),
            Kind::Unrecognized => {
                debug!("Skipping unrecognized result '{}' for query {}", caption_text, query);
                None
            }
        }
    }
}
