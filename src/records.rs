use serde::{Serialize, Serializer};

/// One search-result entry as scraped from a rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResultBlock {
    pub caption_text: String,
    pub body_text: String,
}

impl RawResultBlock {
    pub fn new(caption_text: impl Into<String>, body_text: impl Into<String>) -> Self {
        RawResultBlock {
            caption_text: caption_text.into(),
            body_text: body_text.into(),
        }
    }
}

/// Registry status of a legal entity. Anything without a termination
/// marker is `Active` and serialises as an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegalStatus {
    #[default]
    Active,
    Liquidated,
}

impl LegalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegalStatus::Active => "",
            LegalStatus::Liquidated => "liquidated",
        }
    }
}

impl Serialize for LegalStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Legal entity row. Field order is the CSV column order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LegalEntityRecord {
    pub search_query: String,
    pub entity_name: String,
    pub full_text: String,
    pub region: String,
    pub ogrn: String,
    pub inn: String,
    pub head_name: String,
    pub status: LegalStatus,
    pub stop_date: String,
    pub pdf_file: String,
}

impl LegalEntityRecord {
    pub fn is_liquidated(&self) -> bool {
        self.status == LegalStatus::Liquidated
    }
}

/// Individual entrepreneur row. No structured fields are derived from the text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EntrepreneurRecord {
    pub search_query: String,
    pub entity_name: String,
    pub full_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Legal(LegalEntityRecord),
    Entrepreneur(EntrepreneurRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_to_csv_values() {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
        wtr.serialize(LegalEntityRecord {
            ogrn: "1082308006846".into(),
            status: LegalStatus::Liquidated,
            stop_date: "16.06.2008".into(),
            ..Default::default()
        })
        .unwrap();
        wtr.serialize(LegalEntityRecord::default()).unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], ",,,,1082308006846,,,liquidated,16.06.2008,");
        assert_eq!(lines[1], ",,,,,,,,,");
    }
}
