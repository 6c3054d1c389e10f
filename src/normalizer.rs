//! Maps uploaded tables with heterogeneous headers onto the canonical
//! citizen-report schema.
//!
//! Header matching is case-insensitive against a fixed alias table.
//! Columns that match no alias are kept verbatim in each record's
//! side-table.

use crate::scorer::{upload_score, PriorityFactors};
use crate::types::{columns, Dataset, Record, Urgency};
use crate::upload::RawTable;
use crate::util::{parse_date_safe, parse_f64_safe};
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("the table has no header row")]
    EmptyHeader,
}

const ALIASES: [(&str, &[&str]); 8] = [
    (columns::ID, &["id", "identificador", "codigo", "código"]),
    (columns::CITY, &["ciudad", "municipio", "city", "localidad"]),
    (
        columns::CATEGORY,
        &["categoría del problema", "categoria del problema", "categoria", "categoría", "category", "tipo_problema", "tipo de problema"],
    ),
    (columns::URGENCY, &["nivel de urgencia", "urgencia", "nivel_urgencia", "urgency"]),
    (columns::RURAL, &["zona rural", "zona_rural", "rural"]),
    (columns::INTERNET, &["acceso a internet", "acceso_internet", "internet"]),
    (columns::PRIORITY, &["prioridad", "priority"]),
    (columns::DATE, &["fecha del reporte", "fecha_reporte", "fecha de reporte", "fecha", "date"]),
];

/// Lower-cased alias → canonical column name.
static COLUMN_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    ALIASES
        .iter()
        .flat_map(|(canonical, aliases)| aliases.iter().map(move |alias| (*alias, *canonical)))
        .collect()
});

const URGENT_VALUES: [&str; 13] = [
    "urgente", "alta", "alto", "crítica", "critica", "crítico", "critico", "emergencia", "high", "urgent",
    "critical", "muy alta", "inmediata",
];

const TRUE_VALUES: [&str; 8] = ["sí", "si", "yes", "true", "1", "1.0", "verdadero", "s"];

pub fn canonical_name(header: &str) -> Option<&'static str> {
    let key = header.trim().to_lowercase();
    COLUMN_ALIASES.get(key.as_str()).copied()
}

/// Any urgency vocabulary that means "urgent" maps to `Urgente`; every
/// other value, including empty, is `No urgente`.
pub fn normalize_urgency(value: &str) -> Urgency {
    let v = value.trim().to_lowercase();
    if URGENT_VALUES.contains(&v.as_str()) {
        Urgency::Urgent
    } else {
        Urgency::NotUrgent
    }
}

/// `None` for an empty cell so the caller can apply the field default.
pub fn parse_flag(value: &str) -> Option<bool> {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return None;
    }
    Some(TRUE_VALUES.contains(&v.as_str()))
}

/// Where each canonical field lives in a raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub id: Option<usize>,
    pub city: Option<usize>,
    pub category: Option<usize>,
    pub urgency: Option<usize>,
    pub rural: Option<usize>,
    pub internet: Option<usize>,
    pub priority: Option<usize>,
    pub date: Option<usize>,
    /// Unrecognized columns: index and the (deduplicated) side-table name.
    pub extras: Vec<(usize, String)>,
}

impl ColumnMapping {
    pub fn resolve(headers: &[String]) -> Self {
        let mut mapping = ColumnMapping::default();
        let mut used_extra_names: HashSet<String> = HashSet::new();

        for (idx, header) in headers.iter().enumerate() {
            let slot = match canonical_name(header) {
                Some(columns::ID) => Some(&mut mapping.id),
                Some(columns::CITY) => Some(&mut mapping.city),
                Some(columns::CATEGORY) => Some(&mut mapping.category),
                Some(columns::URGENCY) => Some(&mut mapping.urgency),
                Some(columns::RURAL) => Some(&mut mapping.rural),
                Some(columns::INTERNET) => Some(&mut mapping.internet),
                Some(columns::PRIORITY) => Some(&mut mapping.priority),
                Some(_) => Some(&mut mapping.date),
                None => None,
            };
            match slot {
                Some(slot) if slot.is_none() => {
                    *slot = Some(idx);
                    continue;
                }
                Some(_) => warn!(column = %header, "duplicate canonical column kept as extra"),
                None => {}
            }

            let base = if header.trim().is_empty() { format!("Unnamed: {idx}") } else { header.clone() };
            let mut name = base.clone();
            let mut n = 1;
            while columns::CANONICAL.contains(&name.as_str()) || used_extra_names.contains(&name) {
                name = format!("{base}.{n}");
                n += 1;
            }
            used_extra_names.insert(name.clone());
            mapping.extras.push((idx, name));
        }
        mapping
    }

    /// Scoring inputs for one raw row; absent columns leave the factor inactive.
    pub fn factors<'a>(&self, row: &'a [String]) -> PriorityFactors<'a> {
        let cell = |idx: Option<usize>| idx.map(|i| row[i].as_str());
        PriorityFactors {
            urgent: cell(self.urgency).map_or(false, |v| normalize_urgency(v).is_urgent()),
            rural: cell(self.rural).and_then(parse_flag).unwrap_or(false),
            no_internet: cell(self.internet).and_then(parse_flag).map_or(false, |has| !has),
            category: cell(self.category),
        }
    }
}

/// A normalized upload together with what the normalizer had to repair.
#[derive(Debug, Clone)]
pub struct Normalization {
    pub dataset: Dataset,
    pub invalid_dates: usize,
    pub computed_priorities: usize,
}

pub fn normalize(table: &RawTable) -> Result<Normalization, NormalizeError> {
    if table.headers.iter().all(|h| h.trim().is_empty()) {
        return Err(NormalizeError::EmptyHeader);
    }
    let mapping = ColumnMapping::resolve(&table.headers);
    debug!(?mapping, "resolved upload columns");

    let mut invalid_dates = 0usize;
    let mut computed_priorities = 0usize;
    let mut records = Vec::with_capacity(table.rows.len());

    for (row_no, row) in table.rows.iter().enumerate() {
        let text = |idx: Option<usize>| idx.map(|i| row[i].trim().to_string()).unwrap_or_default();

        let priority = match mapping.priority.and_then(|i| parse_f64_safe(Some(&row[i]))) {
            Some(p) => p.round().clamp(0.0, 100.0) as u8,
            None => {
                computed_priorities += 1;
                upload_score(&mapping.factors(row))
            }
        };

        let date = match parse_date_safe(mapping.date.map(|i| row[i].as_str())) {
            Ok(d) => d,
            Err(value) => {
                invalid_dates += 1;
                debug!(row = row_no + 1, %value, "unparseable date kept as missing");
                None
            }
        };

        let id = match text(mapping.id) {
            id if id.is_empty() => (row_no + 1).to_string(),
            id => id,
        };

        let extra: BTreeMap<String, String> =
            mapping.extras.iter().map(|(i, name)| (name.clone(), row[*i].clone())).collect();

        records.push(Record {
            id,
            city: text(mapping.city),
            category: text(mapping.category),
            urgency: mapping.urgency.map_or(Urgency::NotUrgent, |i| normalize_urgency(&row[i])),
            rural: mapping.rural.and_then(|i| parse_flag(&row[i])).unwrap_or(false),
            internet: mapping.internet.and_then(|i| parse_flag(&row[i])).unwrap_or(true),
            priority,
            date,
            extra,
        });
    }

    if invalid_dates > 0 {
        warn!(invalid_dates, "upload contains unparseable dates");
    }

    Ok(Normalization {
        dataset: Dataset {
            records,
            extra_columns: mapping.extras.into_iter().map(|(_, name)| name).collect(),
        },
        invalid_dates,
        computed_priorities,
    })
}
