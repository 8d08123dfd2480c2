use std::collections::HashSet;
use std::fs;
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use log::{info, warn};

use crate::error::InputError;

/// Header names recognised as the query column, compared case-insensitively.
const QUERY_HEADERS: &[&str] = &["inn", "инн", "inn_number", "ogrn", "огрн", "query", "id", "code"];

/// Digit-only queries must look like an INN, OGRN or OGRNIP.
const IDENTIFIER_LENGTHS: &[usize] = &[10, 12, 13, 15];

/// Extensions handed to calamine instead of the CSV reader.
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read search queries from a CSV or Excel file, in file order and without
/// duplicates. `column` forces the query column; otherwise it is picked by
/// header name, falling back to the first column.
pub fn load_queries<P: AsRef<Path>>(filename: P, column: Option<usize>) -> Result<Vec<String>, InputError> {
    let path = filename.as_ref();
    if !path.exists() {
        return Err(InputError::NotFound(path.to_path_buf()));
    }

    let rows = if is_spreadsheet(path) { read_excel(path)? } else { read_csv(path)? };
    let queries = select_queries(rows, column);
    info!("Loaded {} queries from {:?}", queries.len(), path);
    Ok(queries)
}

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            SPREADSHEET_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// `;` when it is the more frequent of the two usual separators.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let semicolons = sample.matches(';').count();
    let commas = sample.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn read_csv(path: &Path) -> Result<Vec<Vec<String>>, InputError> {
    let content = fs::read_to_string(path)?;
    let sample: String = content.chars().take(1024).collect();

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&sample))
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_excel(path: &Path) -> Result<Vec<Vec<String>>, InputError> {
    // Picks the xls, xlsx, xlsb or ods reader from the extension.
    let mut workbook = open_workbook_auto(path).map_err(|e| InputError::Excel(e.to_string()))?;
    let worksheets = workbook.worksheets();
    let rows = match worksheets.first() {
        Some((_name, range)) => range
            .rows()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect(),
        None => Vec::new(),
    };
    Ok(rows)
}

/// First row is the header. Applies column selection, cleaning, validation
/// and order-preserving de-duplication.
fn select_queries(rows: Vec<Vec<String>>, column: Option<usize>) -> Vec<String> {
    let mut rows = rows.into_iter();
    let header = rows.next().unwrap_or_default();

    let index = column.unwrap_or_else(|| {
        header
            .iter()
            .position(|name| {
                let name = clean(name).to_lowercase();
                QUERY_HEADERS.contains(&name.as_str())
            })
            .unwrap_or(0)
    });
    info!("Using column {} ({:?}) for queries", index, header.get(index));

    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    for (row_num, row) in rows.enumerate() {
        let value = match row.get(index) {
            Some(v) => clean(v),
            None => continue,
        };
        if value.is_empty() {
            continue;
        }
        if value.chars().all(|c| c.is_ascii_digit()) && !IDENTIFIER_LENGTHS.contains(&value.len()) {
            warn!("Invalid identifier at line {}: '{}' (wrong length)", row_num + 2, value);
            continue;
        }
        if seen.insert(value.clone()) {
            queries.push(value);
        }
    }
    queries
}

fn clean(value: &str) -> String {
    value.trim().replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("a,b,c\n1,2,3"), b',');
        assert_eq!(sniff_delimiter("inn\n7707083893"), b',');
    }

    #[test]
    fn test_header_detection_and_dedup() {
        let data = rows(&[
            &["name", "region", "ИНН"],
            &["Ромашка", "Москва", "7707083893"],
            &["Ромашка", "Москва", "\"7707083893\""],
            &["Лютик", "Тверь", "12345"],
            &["Пусто", "Тверь", ""],
            &["Иванов", "Тверь", "690600170925"],
        ]);
        assert_eq!(select_queries(data, None), vec!["7707083893", "690600170925"]);
    }

    #[test]
    fn test_explicit_column_and_free_text() {
        let data = rows(&[&["a", "b"], &["x", "ООО Ромашка"], &["y"]]);
        assert_eq!(select_queries(data, Some(1)), vec!["ООО Ромашка"]);
    }

    #[test]
    fn test_load_semicolon_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        fs::write(&path, "name;inn\nРомашка;7707083893\nЛютик;7811513750\n").unwrap();

        let queries = load_queries(&path, None).unwrap();
        assert_eq!(queries, vec!["7707083893", "7811513750"]);
    }

    #[test]
    fn test_spreadsheet_dispatch_by_extension() {
        assert!(is_spreadsheet(Path::new("inn.xlsx")));
        assert!(is_spreadsheet(Path::new("inn.XLS")));
        assert!(is_spreadsheet(Path::new("inn.ods")));
        assert!(!is_spreadsheet(Path::new("inn.csv")));
        assert!(!is_spreadsheet(Path::new("inn")));
    }

    #[test]
    fn test_legacy_xls_goes_to_spreadsheet_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.xls");
        // Text content: only an Excel reader rejects it.
        fs::write(&path, "inn\n7707083893\n").unwrap();

        let err = load_queries(&path, None).unwrap_err();
        assert!(matches!(err, InputError::Excel(_)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_queries("/nonexistent/input.csv", None).unwrap_err();
        assert!(matches!(err, InputError::NotFound(_)));
    }
}
