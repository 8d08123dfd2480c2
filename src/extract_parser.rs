//! Parses downloaded EGRUL registry extracts (PDF) into flat CSV rows.
//!
//! Each field has an ordered rule list; the first rule that matches wins.
//! Text is whitespace-collapsed before matching, so rules never rely on
//! line breaks. Every field that cannot be found stays empty.

use std::fs;
use std::panic;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::error::ExtractError;

/// Extract text shorter than this most likely failed to come out of the PDF.
const SHORT_TEXT: usize = 100;

/// One registry extract. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractRecord {
    pub filename: String,
    pub full_name: String,
    pub ogrn: String,
    pub inn: String,
    pub address: String,
    pub location: String,
    pub responsible_person_name: String,
    pub responsible_person_inn: String,
    pub responsible_person_position: String,
    pub responsible_person_approval_date: String,
    pub founder_full_name: String,
    pub founder_inn: String,
    pub founder_ogrn: String,
    pub founder_date: String,
    pub error: String,
}

impl ExtractRecord {
    fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("full_name", &self.full_name),
            ("ogrn", &self.ogrn),
            ("inn", &self.inn),
            ("address", &self.address),
            ("location", &self.location),
            ("responsible_person_name", &self.responsible_person_name),
            ("responsible_person_inn", &self.responsible_person_inn),
            ("responsible_person_position", &self.responsible_person_position),
            ("responsible_person_approval_date", &self.responsible_person_approval_date),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub parsed: usize,
    pub failed: usize,
}

fn rules(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("extract pattern is valid"))
        .collect()
}

fn first_match(rules: &[Regex], text: &str) -> Option<String> {
    rules
        .iter()
        .find_map(|rule| rule.captures(text).and_then(|caps| caps.get(1)))
        .map(|m| collapse(m.as_str()))
        .filter(|value| !value.is_empty())
}

/// First match that survives `accept`, trying the rules in order.
fn first_accepted(rules: &[Regex], text: &str, accept: impl Fn(&str) -> Option<String>) -> Option<String> {
    rules.iter().find_map(|rule| {
        rule.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| accept(m.as_str()))
    })
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 13 digits once inner spaces are dropped.
fn registration_number(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (digits.len() == 13 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

pub struct ExtractParser {
    full_name: Vec<Regex>,
    ogrn: Vec<Regex>,
    inn: Vec<Regex>,
    address: Vec<Regex>,
    location: Vec<Regex>,
    /// Trailing "<n> ГРН ..." record reference after an address.
    grn_tail: Regex,
    address_header: Regex,
    location_header: Regex,
    responsible_section: Vec<Regex>,
    labelled_name: Regex,
    capitalized_name: Regex,
    person_inn: Vec<Regex>,
    position: Vec<Regex>,
    approval_date: Vec<Regex>,
    founder_section: Vec<Regex>,
    founder_name: Vec<Regex>,
    founder_heading: Regex,
    founder_ogrn: Vec<Regex>,
    founder_inn: Vec<Regex>,
    founder_date: Vec<Regex>,
}

impl Default for ExtractParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractParser {
    pub fn new() -> Self {
        ExtractParser {
            full_name: rules(&[
                r"(?is)настоящая выписка содержит сведения о юридическом лице\s+(.+?)\s+(?:полное наименование|ОГРН)",
                r"(?is)полное наименование юридического лица\s+(.+?)\s+ОГРН",
                r"(?is)Полное наименование на русском языке\s+(.+?)\s+\d+\s+ГРН",
            ]),
            ogrn: rules(&[
                r"(?i)ОГРН\s+((?:\d\s?){12}\d)(?:\D|$)",
                r"(?i)(?:ОГРН|OGRN)[\s:]+(\d{13})",
                r"(?i)основной государственный регистрационный номер[\s:]+(\d{13})",
            ]),
            inn: rules(&[
                r"(?i)ИНН юридического лица\s+(\d{10})(?:\D|$)",
                r"(?i)ИНН[\s:]+(\d{10})(?:\D|$)",
            ]),
            address: rules(&[
                r"(?is)Адрес(?:\s+юридического\s+лица)?\s+(\d{6},\s+.*?)\d+\s+ГРН",
                r"(?is)Адрес(?:\s+юридического\s+лица)?\s+(.*?)\d+\s+ГРН",
            ]),
            location: rules(&[
                r"(?is)Место нахождения юридического лица\s+(.*?)\d+\s+ГРН",
                r"(?is)Место нахождения\s+(.*?)\d+\s+ГРН",
            ]),
            grn_tail: Regex::new(r"\d+\s*ГРН").expect("GRN pattern is valid"),
            address_header: Regex::new(r"^Адрес\s+юридического\s+лица\s+").expect("address header is valid"),
            location_header: Regex::new(r"^Место нахождения юридического лица\s+").expect("location header is valid"),
            responsible_section: rules(&[
                r"(?is)Сведения о лице, имеющем право без доверенности действовать от имени юридического\s+лица(.*?)(?:Сведения об участниках|$)",
                r"(?is)Сведения о лице, имеющем право без доверенности(.*?)(?:Сведения об участниках|$)",
                r"(?is)(?:Генеральный директор|Исполнительный директор|Управляющий директор|Руководитель|Директор|Вице-президент|Президент|Первый заместитель министра|Заместитель министра|Министр|Губернатор|Мэр|Глава администрации|Председатель|Начальник|Заведующий)(.*?)(?:Сведения об участниках|$)",
            ]),
            labelled_name: Regex::new(r"(?i)Фамилия\s+Имя\s+Отчество\s+([А-ЯЁ]+)\s+([А-ЯЁ]+)\s+([А-ЯЁ]+)")
                .expect("labelled name pattern is valid"),
            capitalized_name: Regex::new(r"([А-ЯЁ][А-ЯЁа-яё]+)\s+([А-ЯЁ][А-ЯЁа-яё]+)\s+([А-ЯЁ][А-ЯЁа-яё]+)")
                .expect("name pattern is valid"),
            person_inn: rules(&[r"(?i)ИНН[\s:]+(\d{12}|\d{10})(?:\D|$)"]),
            position: rules(&[
                r"(?is)Должность\s+(.+?)\s*\d+\s+ГРН",
                r"(?is)Должность[\s:]+(.+?)(?:\d+\s+|\s+ИНН|\s+Сведения)",
                r"(?is)(?:Роль|Position)[\s:]+(.+?)(?:\d+\s+ГРН|\s+ИНН)",
            ]),
            approval_date: rules(&[
                r"(?is)ГРН и дата внесения в ЕГРЮЛ сведений о\s+данном лице\s+\d+\s+(\d{2}\.\d{2}\.\d{4})",
                r"(?is)внесения в ЕГРЮЛ записи.+?(\d{2}\.\d{2}\.\d{4})",
                r"(?i)Дата внесения в ЕГРЮЛ[\s:]+(\d{2}\.\d{2}\.\d{4})",
            ]),
            founder_section: rules(&[
                r"(?is)Сведения об участниках\s*/\s*учредителях юридического лица(.*?)(?:Сведения о записях|$)",
                r"(?is)Сведения об участниках\s*/\s*учредителях(.*?)(?:Сведения о записях|$)",
                r"(?is)Сведения об учредителях юридического лица(.*?)(?:Сведения о записях|$)",
                r"(?is)Сведения об учредителях(.*?)(?:Сведения о записях|$)",
            ]),
            founder_name: rules(&[
                r"(?i)(?:Участник\s*/\s*учредитель|Учредитель)\s+([^0-9]{5,}?)\s*(?:\d+\s+ГРН|$)",
                r"(?i)(?:Полное наименование|Наименование)\s+([^0-9]{5,}?)\s*(?:\d+\s+ГРН|$)",
                r"([А-ЯЁ][^0-9]{15,}?)\s*(?:ИНН|ОГРН)",
            ]),
            founder_heading: Regex::new(r"(?i)^(?:Участник\s*/\s*учредитель|Учредитель|Полное наименование|Наименование)\s+")
                .expect("founder heading pattern is valid"),
            founder_ogrn: rules(&[
                r"(?i)ОГРН\s+((?:\d\s?){12}\d)(?:\D|$)",
                r"(?i)(?:ОГРН|OGRN)[\s:]+(\d{13})",
                r"(?i)ОГРН\D{0,80}?(\d{13})",
            ]),
            founder_inn: rules(&[r"(?i)(?:ИНН|INN)[\s:]+(\d{10})(?:\D|$)", r"(?i)ИНН\D{0,80}?(\d{10})(?:\D|$)"]),
            founder_date: rules(&[
                r"(?is)ГРН и дата внесения в ЕГРЮЛ сведений о\s+данном лице\s+\d+\s+(\d{2}\.\d{2}\.\d{4})",
                r"(?is)(?:создание|регистрация).{0,200}?(\d{2}\.\d{2}\.\d{4})",
                r"(?is)внесения в ЕГРЮЛ записи.*?(\d{2}\.\d{2}\.\d{4})",
                r"(\d{2}\.\d{2}\.\d{4})",
            ]),
        }
    }

    /// Parse the text of one extract. `filename` is carried into the record.
    pub fn parse(&self, text: &str, filename: &str) -> ExtractRecord {
        let text = collapse(&text.replace('\u{a0}', " "));
        if text.chars().count() < SHORT_TEXT {
            warn!("Very short text extracted from {} ({} chars)", filename, text.chars().count());
        }

        let mut record = ExtractRecord {
            filename: filename.to_string(),
            full_name: first_match(&self.full_name, &text).unwrap_or_default(),
            ogrn: first_accepted(&self.ogrn, &text, registration_number).unwrap_or_default(),
            inn: first_match(&self.inn, &text).unwrap_or_default(),
            address: first_match(&self.address, &text)
                .map(|a| self.trim_address(&a, &self.address_header))
                .unwrap_or_default(),
            location: first_match(&self.location, &text)
                .map(|l| self.trim_address(&l, &self.location_header))
                .unwrap_or_default(),
            ..Default::default()
        };

        if let Some(section) = first_match(&self.responsible_section, &text) {
            self.fill_responsible_person(&mut record, &section);
        }

        let missing = record.missing_fields();
        if !missing.is_empty() {
            warn!("Missing fields in {}: {}", filename, missing.join(", "));
        }

        match first_match(&self.founder_section, &text) {
            Some(section) => self.fill_founder(&mut record, &section),
            None => warn!("No founder section found in {}", filename),
        }
        record
    }

    /// Read a PDF and parse it. Extraction failures end up in the `error` column.
    pub fn parse_file(&self, path: &Path) -> ExtractRecord {
        self.parse_with(path, pdf_text)
    }

    fn parse_with<F>(&self, path: &Path, read_text: F) -> ExtractRecord
    where
        F: Fn(&Path) -> Result<String, ExtractError>,
    {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Processing {}", filename);

        match read_text(path) {
            Ok(text) if !text.trim().is_empty() => self.parse(&text, &filename),
            Ok(_) => failed(filename, "Failed to extract text".to_string()),
            Err(e) => {
                warn!("Error extracting text from {}: {}", filename, e);
                failed(filename, e.to_string())
            }
        }
    }

    /// Parse every `*.pdf` in `dir` (in name order) into a fresh CSV at `output`.
    pub fn process_dir(&self, dir: &Path, output: &Path) -> Result<ExtractSummary, ExtractError> {
        self.process_dir_with(dir, output, pdf_text)
    }

    fn process_dir_with<F>(&self, dir: &Path, output: &Path, read_text: F) -> Result<ExtractSummary, ExtractError>
    where
        F: Fn(&Path) -> Result<String, ExtractError>,
    {
        let files = pdf_files(dir)?;
        let mut summary = ExtractSummary::default();
        if files.is_empty() {
            warn!("No PDF files found in {:?}", dir);
            return Ok(summary);
        }
        info!("Found {} PDF files to process", files.len());

        let mut writer = csv::Writer::from_path(output)?;
        for path in &files {
            let record = self.parse_with(path, &read_text);
            if record.error.is_empty() {
                summary.parsed += 1;
            } else {
                summary.failed += 1;
            }
            writer.serialize(&record)?;
        }
        writer.flush()?;

        info!(
            "Processing complete. Successfully processed: {}, Errors: {}. Data saved to {:?}",
            summary.parsed, summary.failed, output
        );
        Ok(summary)
    }

    fn trim_address(&self, raw: &str, header: &Regex) -> String {
        let without_header = header.replace(raw, "");
        let kept = match self.grn_tail.find(&without_header) {
            Some(m) => &without_header[..m.start()],
            None => &without_header[..],
        };
        kept.trim().to_string()
    }

    fn fill_responsible_person(&self, record: &mut ExtractRecord, section: &str) {
        record.responsible_person_name = self
            .labelled_name
            .captures(section)
            .map(|caps| format!("{} {} {}", &caps[1], &caps[2], &caps[3]))
            .or_else(|| {
                self.capitalized_name
                    .captures_iter(section)
                    .map(|caps| format!("{} {} {}", &caps[1], &caps[2], &caps[3]))
                    .find(|name| !name.split(' ').any(|w| matches!(w, "Фамилия" | "Имя" | "Отчество")))
            })
            .unwrap_or_default();
        record.responsible_person_inn = first_match(&self.person_inn, section).unwrap_or_default();
        record.responsible_person_position = first_match(&self.position, section).unwrap_or_default();
        record.responsible_person_approval_date = first_match(&self.approval_date, section).unwrap_or_default();
    }

    fn fill_founder(&self, record: &mut ExtractRecord, section: &str) {
        record.founder_full_name = first_match(&self.founder_name, section)
            .map(|name| self.founder_heading.replace(&name, "").trim().to_string())
            .unwrap_or_default();
        record.founder_ogrn = first_accepted(&self.founder_ogrn, section, registration_number).unwrap_or_default();
        record.founder_inn = first_match(&self.founder_inn, section).unwrap_or_default();
        record.founder_date = first_match(&self.founder_date, section).unwrap_or_default();
        debug!(
            "Founder of {}: name={:?} ogrn={:?} inn={:?} date={:?}",
            record.filename, record.founder_full_name, record.founder_ogrn, record.founder_inn, record.founder_date
        );
    }
}

fn failed(filename: String, error: String) -> ExtractRecord {
    ExtractRecord {
        filename,
        error,
        ..Default::default()
    }
}

fn pdf_files(dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn pdf_text(path: &Path) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed documents.
    match panic::catch_unwind(|| pdf_extract::extract_text(path)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("PDF reader crashed on this file".to_string())),
    }
}
