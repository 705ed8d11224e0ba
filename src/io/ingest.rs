//! CSV ingest for objective and subjective score sheets.
//!
//! Objective sheet: first column `stimulus`, every other column a numeric predictor.
//! Subjective sheet: `stimulus` and `MOS` columns (any order, extra columns ignored).
//!
//! Design goals:
//! - **Strict schema**: missing columns and unparseable cells are errors with line numbers
//! - **NaN-tolerant values**: empty cells and `nan`/`inf` literals are kept as
//!   non-finite numbers; the sample extractor decides what to drop
//! - **No alignment here**: ordering checks happen when a `Dataset` is built

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use nalgebra::{DMatrix, DVector};

use crate::domain::{ObjectiveTable, SubjectiveTable};
use crate::error::EvalError;

/// Load the objective predictor sheet.
pub fn read_objective_csv(path: &Path) -> Result<ObjectiveTable, EvalError> {
    let file = open(path)?;
    parse_objective(file, &path.display().to_string())
}

/// Load the subjective sheet, dropping the rows at `hidden_references` (0-based data rows).
pub fn read_subjective_csv(
    path: &Path,
    hidden_references: &[usize],
) -> Result<SubjectiveTable, EvalError> {
    let file = open(path)?;
    parse_subjective(file, &path.display().to_string(), hidden_references)
}

pub fn parse_objective<R: Read>(reader: R, origin: &str) -> Result<ObjectiveTable, EvalError> {
    let mut reader = csv_reader(reader);
    let headers = reader.headers()?.clone();

    if headers.len() < 2 {
        return Err(EvalError::invalid_input(format!(
            "{origin}: expected a `stimulus` column followed by at least one predictor column"
        )));
    }
    if normalize_header_name(&headers[0]) != "stimulus" {
        return Err(EvalError::invalid_input(format!(
            "{origin}: first column must be `stimulus`, found `{}`",
            &headers[0]
        )));
    }
    let predictors: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
    let width = predictors.len();

    let mut stimuli = Vec::new();
    let mut values = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, and the header occupies line 1.
        let line = idx + 2;
        let record = result?;
        if record.len() != headers.len() {
            return Err(EvalError::invalid_input(format!(
                "{origin}:{line}: expected {} fields, found {}",
                headers.len(),
                record.len()
            )));
        }

        stimuli.push(record[0].to_string());
        for (col, cell) in record.iter().enumerate().skip(1) {
            let v = parse_score(cell).ok_or_else(|| {
                EvalError::invalid_input(format!(
                    "{origin}:{line}: invalid value '{cell}' in column `{}`",
                    predictors[col - 1]
                ))
            })?;
            values.push(v);
        }
    }

    if stimuli.is_empty() {
        return Err(EvalError::invalid_input(format!("{origin}: no data rows")));
    }

    Ok(ObjectiveTable {
        scores: DMatrix::from_row_slice(stimuli.len(), width, &values),
        stimuli,
        predictors,
    })
}

pub fn parse_subjective<R: Read>(
    reader: R,
    origin: &str,
    hidden_references: &[usize],
) -> Result<SubjectiveTable, EvalError> {
    let mut reader = csv_reader(reader);
    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);

    let stim_col = required_column(&header_map, "stimulus", origin)?;
    let mos_col = required_column(&header_map, "mos", origin)?;

    let mut stimuli = Vec::new();
    let mut mos = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result?;
        let id = field(&record, stim_col, line, origin)?;
        let raw = field(&record, mos_col, line, origin)?;
        let value = parse_score(raw).ok_or_else(|| {
            EvalError::invalid_input(format!("{origin}:{line}: invalid MOS value '{raw}'"))
        })?;
        stimuli.push(id.to_string());
        mos.push(value);
    }

    let hidden: BTreeSet<usize> = hidden_references.iter().copied().collect();
    if let Some(&bad) = hidden.iter().find(|&&r| r >= stimuli.len()) {
        return Err(EvalError::invalid_input(format!(
            "{origin}: hidden reference row {bad} is out of range ({} rows)",
            stimuli.len()
        )));
    }

    let (stimuli, mos): (Vec<String>, Vec<f64>) = stimuli
        .into_iter()
        .zip(mos)
        .enumerate()
        .filter(|(row, _)| !hidden.contains(row))
        .map(|(_, pair)| pair)
        .unzip();

    Ok(SubjectiveTable {
        stimuli,
        mos: DVector::from_vec(mos),
    })
}

fn open(path: &Path) -> Result<File, EvalError> {
    File::open(path).map_err(|e| {
        EvalError::invalid_input(format!("Failed to open CSV '{}': {e}", path.display()))
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn required_column(
    header_map: &HashMap<String, usize>,
    name: &str,
    origin: &str,
) -> Result<usize, EvalError> {
    header_map.get(name).copied().ok_or_else(|| {
        EvalError::invalid_input(format!("{origin}: missing required column `{name}`"))
    })
}

fn field<'r>(
    record: &'r StringRecord,
    col: usize,
    line: usize,
    origin: &str,
) -> Result<&'r str, EvalError> {
    record.get(col).ok_or_else(|| {
        EvalError::invalid_input(format!("{origin}:{line}: missing field {}", col + 1))
    })
}

/// Empty cells are NaN; `nan`, `inf`, `-inf` parse as such.
fn parse_score(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(f64::NAN);
    }
    cell.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_objective_sheet_with_bom_and_nan() {
        let csv = "\u{feff}stimulus,p1,p2\ns1,0.5,1.5\ns2,,inf\ns3,NaN,2\n";
        let t = parse_objective(csv.as_bytes(), "obj").unwrap();
        assert_eq!(t.stimuli, vec!["s1", "s2", "s3"]);
        assert_eq!(t.predictors, vec!["p1", "p2"]);
        assert_eq!(t.scores.shape(), (3, 2));
        assert_eq!(t.scores[(0, 1)], 1.5);
        assert!(t.scores[(1, 0)].is_nan());
        assert!(t.scores[(1, 1)].is_infinite());
        assert!(t.scores[(2, 0)].is_nan());
    }

    #[test]
    fn objective_requires_stimulus_first() {
        let err = parse_objective("p1,stimulus\n1,a\n".as_bytes(), "obj").unwrap_err();
        assert!(err.to_string().contains("first column"));
    }

    #[test]
    fn objective_reports_bad_cells_with_line() {
        let err = parse_objective("stimulus,p1\na,1\nb,oops\n".as_bytes(), "obj").unwrap_err();
        assert!(err.to_string().contains("obj:3"), "{err}");
    }

    #[test]
    fn subjective_drops_hidden_references() {
        let csv = "stimulus,MOS,extra\nref,5.0,x\na,4.0,x\nb,3.0,x\nref2,5.0,x\nc,2.0,x\n";
        let t = parse_subjective(csv.as_bytes(), "subj", &[0, 3]).unwrap();
        assert_eq!(t.stimuli, vec!["a", "b", "c"]);
        assert_eq!(t.mos.as_slice(), &[4.0, 3.0, 2.0]);
    }

    #[test]
    fn subjective_requires_mos_column() {
        let err = parse_subjective("stimulus,score\na,1\n".as_bytes(), "subj", &[]).unwrap_err();
        assert!(err.to_string().contains("`mos`"), "{err}");
    }

    #[test]
    fn subjective_rejects_out_of_range_hidden_reference() {
        let err = parse_subjective("stimulus,MOS\na,1\n".as_bytes(), "subj", &[4]).unwrap_err();
        assert!(matches!(err, EvalError::InvalidInput(_)));
    }
}
