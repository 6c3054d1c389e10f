use crate::types::{Dataset, RawRow};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `dataset` in the canonical column layout.
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    let rows: Vec<RawRow> = dataset.records.iter().map(RawRow::from).collect();
    write_csv(path, &rows)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn print_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{generate_sample, load_csv};
    use crate::types::DistributionRow;

    #[test]
    fn test_dataset_csv_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muestra.csv");
        let sample = generate_sample(25, 7);
        write_dataset_csv(&path, &sample).unwrap();

        let (reloaded, report) = load_csv(&path).unwrap();
        assert_eq!(report.parse_errors + report.invalid_dates, 0);
        assert_eq!(report.computed_priorities, 0);
        assert_eq!(reloaded.records, sample.records);
    }

    #[test]
    fn test_render_table_markdown() {
        let rows = vec![DistributionRow { label: "Salud".into(), count: 2, share: "66.7%".into() }];
        let out = render_table(&rows, 10);
        assert!(out.contains("| Label"));
        assert!(out.contains("Salud"));
        assert_eq!(render_table::<DistributionRow>(&[], 10), "(no rows)");
    }
}
