use regex::Regex;

use crate::extractor::{OGRN_PATTERN, OGRNIP_PATTERN};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    LegalEntity,
    Entrepreneur,
    Unrecognized,
}

/// Routes a result body to the legal-entity or entrepreneur path by the
/// registration number it carries. OGRNIP is checked first.
pub struct RecordClassifier {
    ogrnip_regex: Regex,
    ogrn_regex: Regex,
}

impl Default for RecordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordClassifier {
    pub fn new() -> Self {
        RecordClassifier {
            ogrnip_regex: Regex::new(OGRNIP_PATTERN).expect("OGRNIP pattern is valid"),
            ogrn_regex: Regex::new(OGRN_PATTERN).expect("OGRN pattern is valid"),
        }
    }

    pub fn classify(&self, body_text: &str) -> Kind {
        if self.ogrnip_regex.is_match(body_text) {
            Kind::Entrepreneur
        } else if self.ogrn_regex.is_match(body_text) {
            Kind::LegalEntity
        } else {
            Kind::Unrecognized
        }
    }
}
