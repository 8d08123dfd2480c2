use regex::Regex;

use crate::records::{EntrepreneurRecord, LegalEntityRecord, LegalStatus};

/// 13-digit OGRN after its label. Requiring a digit right after the label
/// (optionally separated by `:` and spaces) rules out `ОГРНИП`.
pub(crate) const OGRN_PATTERN: &str = r"(?i)ОГРН\s*:?\s*(\d{13})(?:\D|$)";
pub(crate) const OGRNIP_PATTERN: &str = r"(?i)ОГРНИП\s*:?\s*(\d{15})(?:\D|$)";

const INN_PATTERN: &str = r"(?i)ИНН\s*:?\s*(\d{12}|\d{10})(?:\D|$)";
const KPP_PATTERN: &str = r"(?i)КПП";
const TERMINATION_PATTERN: &str = r"(?i)дата\s+прекращения\s+деятельности";
const DATE_PATTERN: &str = r"(?:^|\D)(\d{2}\.\d{2}\.\d{4})(?:\D|$)";

/// Head-of-entity titles, most specific first. The first title in this list
/// that occurs after the KPP marker wins, so `ДИРЕКТОР` never shadows
/// `ГЕНЕРАЛЬНЫЙ ДИРЕКТОР`.
pub(crate) const TITLE_KEYWORDS: &[&str] = &[
    "РУКОВОДИТЕЛЬ ЮРИДИЧЕСКОГО ЛИЦА",
    "ПРЕДСЕДАТЕЛЬ ПРАВЛЕНИЯ",
    "ГЕНЕРАЛЬНЫЙ ДИРЕКТОР",
    "ИСПОЛНИТЕЛЬНЫЙ ДИРЕКТОР",
    "УПРАВЛЯЮЩИЙ ДИРЕКТОР",
    "КОНКУРСНЫЙ УПРАВЛЯЮЩИЙ",
    "ПРЕДСЕДАТЕЛЬ",
    "ПРЕЗИДЕНТ",
    "ДИРЕКТОР",
    "РУКОВОДИТЕЛЬ",
    "УПРАВЛЯЮЩИЙ",
    "ЛИКВИДАТОР",
    "НАЧАЛЬНИК",
    "РЕКТОР",
    "ГЛАВА",
];

/// Turns the free-form body of a result block into typed fields.
///
/// Every field is looked up on its own: a field that is not found comes
/// back as an empty string and never stops the others from being filled.
pub struct Extractor {
    ogrn_regex: Regex,
    inn_regex: Regex,
    kpp_regex: Regex,
    termination_regex: Regex,
    date_regex: Regex,
    title_rules: Vec<Regex>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        let title_rules = TITLE_KEYWORDS
            .iter()
            .map(|title| {
                let words: Vec<String> = title.split_whitespace().map(regex::escape).collect();
                Regex::new(&format!(r"(?i)\b{}\b", words.join(r"\s+")))
                    .expect("title keyword pattern is valid")
            })
            .collect();

        Extractor {
            ogrn_regex: Regex::new(OGRN_PATTERN).expect("OGRN pattern is valid"),
            inn_regex: Regex::new(INN_PATTERN).expect("INN pattern is valid"),
            kpp_regex: Regex::new(KPP_PATTERN).expect("KPP pattern is valid"),
            termination_regex: Regex::new(TERMINATION_PATTERN).expect("termination pattern is valid"),
            date_regex: Regex::new(DATE_PATTERN).expect("date pattern is valid"),
            title_rules,
        }
    }

    /// Legal-entity fields. `search_query` and `entity_name` are left for the
    /// caller, `full_text` is the body verbatim.
    pub fn extract_legal(&self, body_text: &str) -> LegalEntityRecord {
        let stop_date = self.extract_stop_date(body_text);
        let status = if stop_date.is_some() {
            LegalStatus::Liquidated
        } else {
            LegalStatus::Active
        };

        LegalEntityRecord {
            full_text: body_text.to_string(),
            region: self.extract_region(body_text),
            ogrn: self.extract_ogrn(body_text),
            inn: self.extract_inn(body_text),
            head_name: self.extract_head_name(body_text),
            status,
            stop_date: stop_date.flatten().unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn extract_entrepreneur(&self, body_text: &str) -> EntrepreneurRecord {
        EntrepreneurRecord {
            full_text: body_text.to_string(),
            ..Default::default()
        }
    }

    pub fn extract_region(&self, text: &str) -> String {
        text.split_once(',')
            .map(|(region, _)| region.trim().to_string())
            .unwrap_or_default()
    }

    pub fn extract_ogrn(&self, text: &str) -> String {
        first_capture(&self.ogrn_regex, text)
    }

    pub fn extract_inn(&self, text: &str) -> String {
        first_capture(&self.inn_regex, text)
    }

    pub fn extract_head_name(&self, text: &str) -> String {
        let tail = match self.kpp_regex.find(text) {
            Some(m) => &text[m.end()..],
            None => return String::new(),
        };

        for rule in &self.title_rules {
            if let Some(m) = rule.find(tail) {
                let rest = &tail[m.end()..];
                let span = rest.split([',', ';']).next().unwrap_or_default();
                return span
                    .trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | '-' | '.'))
                    .to_string();
            }
        }
        String::new()
    }

    /// `None` when there is no termination marker. `Some(None)` when the
    /// marker is present but no date follows it.
    fn extract_stop_date(&self, text: &str) -> Option<Option<String>> {
        let marker = self.termination_regex.find(text)?;
        let after = &text[marker.end()..];
        Some(
            self.date_regex
                .captures(after)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        )
    }
}

fn first_capture(regex: &Regex, text: &str) -> String {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPB: &str = "Г.Санкт-Петербург, ОГРН: 1127847079194, ИНН: 7811513750, КПП ..., ГЕНЕРАЛЬНЫЙ ДИРЕКТОР Мирошниченко Андрей Сергеевич";

    #[test]
    fn test_extract_legal_scenario() {
        let record = Extractor::new().extract_legal(SPB);
        assert_eq!(record.region, "Г.Санкт-Петербург");
        assert_eq!(record.ogrn, "1127847079194");
        assert_eq!(record.inn, "7811513750");
        assert_eq!(record.head_name, "Мирошниченко Андрей Сергеевич");
        assert_eq!(record.status, LegalStatus::Active);
        assert_eq!(record.stop_date, "");
        assert_eq!(record.full_text, SPB);
    }

    #[test]
    fn test_liquidated_entity() {
        let text = "г.Краснодар, ОГРН: 1082308006846, Дата присвоения ОГРН: 29.05.2008, ИНН: 2308145036, КПП: 230801001, Дата прекращения деятельности: 16.06.2008";
        let record = Extractor::new().extract_legal(text);
        assert_eq!(record.status, LegalStatus::Liquidated);
        assert_eq!(record.stop_date, "16.06.2008");
        assert_eq!(record.ogrn, "1082308006846");
        assert_eq!(record.head_name, "");
    }

    #[test]
    fn test_marker_without_date_never_fabricates() {
        let text = "г.Тверь, ОГРН: 1082308006846, Дата прекращения деятельности: неизвестна";
        let record = Extractor::new().extract_legal(text);
        assert_eq!(record.status, LegalStatus::Liquidated);
        assert_eq!(record.stop_date, "");
    }

    #[test]
    fn test_date_before_marker_is_ignored() {
        let text = "г.Тверь, Дата присвоения ОГРН: 29.05.2008, Дата прекращения деятельности";
        let record = Extractor::new().extract_legal(text);
        assert_eq!(record.status, LegalStatus::Liquidated);
        assert_eq!(record.stop_date, "");
    }

    #[test]
    fn test_ogrn_ignores_ogrnip_label() {
        let e = Extractor::new();
        assert_eq!(e.extract_ogrn("ОГРНИП: 305690610400436"), "");
        assert_eq!(e.extract_ogrn("ОГРНИП: 3056906104004, ОГРН: 1127847079194"), "1127847079194");
        assert_eq!(e.extract_ogrn("огрн 1127847079194"), "1127847079194");
        // Longer digit runs are not OGRNs.
        assert_eq!(e.extract_ogrn("ОГРН: 11278470791945"), "");
    }

    #[test]
    fn test_inn_lengths() {
        let e = Extractor::new();
        assert_eq!(e.extract_inn("ИНН: 7811513750, КПП"), "7811513750");
        assert_eq!(e.extract_inn("ИНН 690600170925"), "690600170925");
        assert_eq!(e.extract_inn("ИНН: 78115137501"), "");
        assert_eq!(e.extract_inn("без номера"), "");
    }

    #[test]
    fn test_region_requires_comma() {
        let e = Extractor::new();
        assert_eq!(e.extract_region("  г.Москва , ОГРН"), "г.Москва");
        assert_eq!(e.extract_region("г.Москва"), "");
    }

    #[test]
    fn test_title_priority_prefers_specific_title() {
        let e = Extractor::new();
        let text = "г.Москва, ОГРН: 1027700132195, ИНН: 7707083893, КПП: 773601001, ПРЕЗИДЕНТ, ПРЕДСЕДАТЕЛЬ ПРАВЛЕНИЯ: Греф Герман Оскарович";
        assert_eq!(e.extract_head_name(text), "Греф Герман Оскарович");

        let text = "КПП: 773601001, Директор: Иванов Иван Иванович, Дата прекращения деятельности: 01.01.2020";
        assert_eq!(e.extract_head_name(text), "Иванов Иван Иванович");
    }

    #[test]
    fn test_head_name_needs_kpp_and_title() {
        let e = Extractor::new();
        assert_eq!(e.extract_head_name("ГЕНЕРАЛЬНЫЙ ДИРЕКТОР Петров П.П."), "");
        assert_eq!(e.extract_head_name("КПП: 773601001, Петров Петр"), "");
    }

    #[test]
    fn test_missing_fields_are_blank() {
        let record = Extractor::new().extract_legal("ничего полезного");
        assert_eq!(record.region, "");
        assert_eq!(record.ogrn, "");
        assert_eq!(record.inn, "");
        assert_eq!(record.head_name, "");
        assert_eq!(record.stop_date, "");
    }

    #[test]
    fn test_extraction_is_repeatable() {
        let e = Extractor::new();
        assert_eq!(e.extract_legal(SPB), e.extract_legal(SPB));
        assert_eq!(Extractor::new().extract_legal(SPB), e.extract_legal(SPB));
    }

    #[test]
    fn test_entrepreneur_keeps_text_verbatim() {
        let text = "Тверская область, ОГРНИП: 305690610400436, ИНН: 690600170925";
        let record = Extractor::new().extract_entrepreneur(text);
        assert_eq!(record.full_text, text);
        assert_eq!(record.entity_name, "");
    }
}
