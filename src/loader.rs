use crate::normalizer::{normalize_urgency, parse_flag};
use crate::scorer::{baseline_score, PriorityFactors};
use crate::types::{columns, Dataset, RawRow, Record, Urgency};
use crate::util::{parse_date_safe, parse_f64_safe};
use chrono::{Duration, NaiveDate};
use csv::{ReaderBuilder, StringRecord};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SAMPLE_ROWS: usize = 1000;
pub const SAMPLE_SEED: u64 = 42;

const SAMPLE_CITIES: [&str; 5] = ["Bogotá", "Medellín", "Cali", "Barranquilla", "Cartagena"];
const SAMPLE_CATEGORIES: [&str; 4] = ["Educación", "Salud", "Medio Ambiente", "Seguridad"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read dataset {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("dataset {0} has no header row")]
    MissingHeader(PathBuf),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    pub invalid_dates: usize,
    pub computed_priorities: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Sample { rows: usize, seed: u64 },
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub report: LoadReport,
    pub source: DataSource,
}

fn clean_text(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Load a dataset written in the canonical schema.
///
/// Rows that cannot be decoded, or whose report date does not parse, are
/// skipped and counted. A missing priority is computed with the baseline
/// score. Columns outside the canonical schema are kept per record.
pub fn load_csv(path: &Path) -> Result<(Dataset, LoadReport), LoadError> {
    let csv_err = |source| LoadError::Csv { path: path.to_path_buf(), source };
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path).map_err(csv_err)?;
    let headers: StringRecord = rdr.headers().map_err(csv_err)?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(LoadError::MissingHeader(path.to_path_buf()));
    }

    let extra_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !columns::CANONICAL.contains(&h.trim()))
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for (row_no, result) in rdr.records().enumerate() {
        report.total_rows += 1;
        let decoded = result.and_then(|r| {
            let row: RawRow = r.deserialize(Some(&headers))?;
            Ok((r, row))
        });
        let (string_record, row) = match decoded {
            Ok(pair) => pair,
            Err(e) => {
                report.parse_errors += 1;
                debug!(row = row_no + 1, error = %e, "skipping undecodable row");
                continue;
            }
        };

        let date = match parse_date_safe(row.date.as_deref()) {
            Ok(d) => d,
            Err(value) => {
                report.invalid_dates += 1;
                debug!(row = row_no + 1, %value, "skipping row with unparseable date");
                continue;
            }
        };

        let category = clean_text(row.category);
        let urgency = row.urgency.as_deref().map_or(Urgency::NotUrgent, normalize_urgency);
        let rural = row.rural.as_deref().and_then(parse_flag).unwrap_or(false);
        let internet = row.internet.as_deref().and_then(parse_flag).unwrap_or(true);

        let priority = match parse_f64_safe(row.priority.as_deref()) {
            Some(p) => p.round().clamp(0.0, 100.0) as u8,
            None => {
                report.computed_priorities += 1;
                baseline_score(&PriorityFactors {
                    urgent: urgency.is_urgent(),
                    rural,
                    no_internet: !internet,
                    category: Some(category.as_str()),
                })
            }
        };

        let id = match clean_text(row.id) {
            id if id.is_empty() => (row_no + 1).to_string(),
            id => id,
        };

        let extra: BTreeMap<String, String> = extra_columns
            .iter()
            .map(|(i, name)| (name.clone(), string_record.get(*i).unwrap_or_default().to_string()))
            .collect();

        records.push(Record {
            id,
            city: clean_text(row.city),
            category,
            urgency,
            rural,
            internet,
            priority,
            date,
            extra,
        });
    }

    report.loaded_rows = records.len();
    let dataset = Dataset {
        records,
        extra_columns: extra_columns.into_iter().map(|(_, name)| name).collect(),
    };
    Ok((dataset, report))
}

/// Deterministic synthetic dataset used when no dataset file exists.
pub fn generate_sample(rows: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2024, 1, 1);

    let records = (0..rows)
        .map(|i| {
            let city = SAMPLE_CITIES.choose(&mut rng).copied().unwrap_or_default();
            let category = SAMPLE_CATEGORIES.choose(&mut rng).copied().unwrap_or_default();
            let urgent = rng.gen_bool(0.3);
            let rural = rng.gen_bool(0.3);
            let internet = !rng.gen_bool(0.2);
            let priority = baseline_score(&PriorityFactors {
                urgent,
                rural,
                no_internet: !internet,
                category: Some(category),
            });
            Record {
                id: (i + 1).to_string(),
                city: city.to_string(),
                category: category.to_string(),
                urgency: if urgent { Urgency::Urgent } else { Urgency::NotUrgent },
                rural,
                internet,
                priority,
                date: start.map(|d| d + Duration::days(i as i64)),
                extra: BTreeMap::new(),
            }
        })
        .collect();
    Dataset::new(records)
}

/// Load the first configured path that exists, or fall back to the sample.
///
/// A file that exists but cannot be read is an error, not a fallback.
pub fn load_active(paths: &[PathBuf]) -> Result<LoadOutcome, LoadError> {
    match paths.iter().find(|p| p.exists()) {
        Some(path) => {
            let (dataset, report) = load_csv(path)?;
            info!(
                path = %path.display(),
                rows = report.loaded_rows,
                skipped = report.parse_errors + report.invalid_dates,
                computed_priorities = report.computed_priorities,
                "dataset loaded"
            );
            if report.invalid_dates > 0 {
                warn!(invalid_dates = report.invalid_dates, "rows with unparseable dates were skipped");
            }
            Ok(LoadOutcome { dataset, report, source: DataSource::File(path.clone()) })
        }
        None => {
            warn!(candidates = ?paths, "no dataset file found, using generated sample data");
            let dataset = generate_sample(SAMPLE_ROWS, SAMPLE_SEED);
            let report = LoadReport {
                total_rows: dataset.len(),
                loaded_rows: dataset.len(),
                computed_priorities: dataset.len(),
                ..LoadReport::default()
            };
            Ok(LoadOutcome {
                dataset,
                report,
                source: DataSource::Sample { rows: SAMPLE_ROWS, seed: SAMPLE_SEED },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const HEADER: &str = "ID,Ciudad,Categoría del problema,Nivel de urgencia,Zona rural,Acceso a internet,Prioridad,Fecha del reporte,Comentario\n";

    #[test]
    fn test_load_csv_parses_and_skips_bad_dates() {
        let f = csv_file(&format!(
            "{HEADER}1,Cali,Salud,Urgente,1,0,,2024-01-05,sin médicos\n\
             2,Cali,Seguridad,No urgente,0,1,64,no-date,x\n\
             3,Pasto,Educación,No urgente,0,1,55,,\n"
        ));
        let (ds, report) = load_csv(f.path()).unwrap();
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(report.invalid_dates, 1);
        assert_eq!(report.computed_priorities, 1);
        assert_eq!(ds.extra_columns, vec!["Comentario"]);

        let first = &ds.records[0];
        assert!(first.urgency.is_urgent() && first.rural && !first.internet);
        assert_eq!(first.priority, 100);
        assert_eq!(first.extra["Comentario"], "sin médicos");

        let second = &ds.records[1];
        assert_eq!(second.id, "3");
        assert_eq!(second.priority, 55);
        assert_eq!(second.date, None);
    }

    #[test]
    fn test_sample_is_deterministic_and_scored() {
        let a = generate_sample(50, SAMPLE_SEED);
        let b = generate_sample(50, SAMPLE_SEED);
        assert_eq!(a.records, b.records);
        assert_eq!(a.len(), 50);
        for r in &a.records {
            assert!((20..=100).contains(&r.priority));
            assert!(SAMPLE_CITIES.contains(&r.city.as_str()));
        }
        assert_eq!(a.records[0].date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(a.records[49].date, NaiveDate::from_ymd_opt(2024, 2, 19));
    }

    #[test]
    fn test_load_active_prefers_first_existing() {
        let f = csv_file(&format!("{HEADER}9,Cali,Salud,Urgente,0,1,80,2024-02-01,\n"));
        let paths = vec![PathBuf::from("/definitely/not/here.csv"), f.path().to_path_buf()];
        let outcome = load_active(&paths).unwrap();
        assert_eq!(outcome.source, DataSource::File(f.path().to_path_buf()));
        assert_eq!(outcome.dataset.len(), 1);
    }

    #[test]
    fn test_load_active_falls_back_to_sample() {
        let outcome = load_active(&[PathBuf::from("/definitely/not/here.csv")]).unwrap();
        assert_eq!(outcome.source, DataSource::Sample { rows: SAMPLE_ROWS, seed: SAMPLE_SEED });
        assert_eq!(outcome.dataset.len(), SAMPLE_ROWS);
    }
}
