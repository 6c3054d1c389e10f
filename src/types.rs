use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

/// Canonical column names of the citizen-report schema.
pub mod columns {
    pub const ID: &str = "ID";
    pub const CITY: &str = "Ciudad";
    pub const CATEGORY: &str = "Categoría del problema";
    pub const URGENCY: &str = "Nivel de urgencia";
    pub const RURAL: &str = "Zona rural";
    pub const INTERNET: &str = "Acceso a internet";
    pub const PRIORITY: &str = "Prioridad";
    pub const DATE: &str = "Fecha del reporte";

    pub const CANONICAL: [&str; 8] = [ID, CITY, CATEGORY, URGENCY, RURAL, INTERNET, PRIORITY, DATE];
}

/// One row of a dataset file in the canonical schema, before validation.
///
/// Used both for reading the baseline CSV and for writing generated samples,
/// so every field stays textual.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct RawRow {
    #[serde(rename = "ID")]
    pub id: Option<String>,
    #[serde(rename = "Ciudad")]
    pub city: Option<String>,
    #[serde(rename = "Categoría del problema")]
    pub category: Option<String>,
    #[serde(rename = "Nivel de urgencia")]
    pub urgency: Option<String>,
    #[serde(rename = "Zona rural")]
    pub rural: Option<String>,
    #[serde(rename = "Acceso a internet")]
    pub internet: Option<String>,
    #[serde(rename = "Prioridad")]
    pub priority: Option<String>,
    #[serde(rename = "Fecha del reporte")]
    pub date: Option<String>,
}

impl From<&Record> for RawRow {
    fn from(r: &Record) -> Self {
        Self {
            id: Some(r.id.clone()),
            city: Some(r.city.clone()),
            category: Some(r.category.clone()),
            urgency: Some(r.urgency.label().to_string()),
            rural: Some(u8::from(r.rural).to_string()),
            internet: Some(u8::from(r.internet).to_string()),
            priority: Some(r.priority.to_string()),
            date: r.date.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Urgency {
    #[serde(rename = "Urgente")]
    Urgent,
    #[serde(rename = "No urgente")]
    NotUrgent,
}

impl Urgency {
    pub fn label(self) -> &'static str {
        match self {
            Urgency::Urgent => "Urgente",
            Urgency::NotUrgent => "No urgente",
        }
    }

    /// Exact match against the two canonical labels.
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim() {
            "Urgente" => Some(Urgency::Urgent),
            "No urgente" => Some(Urgency::NotUrgent),
            _ => None,
        }
    }

    pub fn is_urgent(self) -> bool {
        self == Urgency::Urgent
    }
}

mod flag {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }
}

/// A validated citizen report.
///
/// Flags serialize as `0`/`1`; unrecognized source columns are flattened
/// into the same JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Ciudad")]
    pub city: String,
    #[serde(rename = "Categoría del problema")]
    pub category: String,
    #[serde(rename = "Nivel de urgencia")]
    pub urgency: Urgency,
    #[serde(rename = "Zona rural", serialize_with = "flag::serialize")]
    pub rural: bool,
    #[serde(rename = "Acceso a internet", serialize_with = "flag::serialize")]
    pub internet: bool,
    #[serde(rename = "Prioridad")]
    pub priority: u8,
    #[serde(rename = "Fecha del reporte")]
    pub date: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub records: Vec<Record>,
    /// Names of the side-table columns, in source order.
    pub extra_columns: Vec<String>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records, extra_columns: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_count(&self) -> usize {
        columns::CANONICAL.len() + self.extra_columns.len()
    }

    /// Cells that carry no value: empty identifier, city or category, a
    /// missing date, or an empty/absent side-table entry.
    pub fn missing_cells(&self) -> usize {
        self.records
            .iter()
            .map(|r| {
                let canonical = [r.id.is_empty(), r.city.is_empty(), r.category.is_empty(), r.date.is_none()]
                    .iter()
                    .filter(|m| **m)
                    .count();
                let extra = self
                    .extra_columns
                    .iter()
                    .filter(|c| r.extra.get(*c).map_or(true, |v| v.trim().is_empty()))
                    .count();
                canonical + extra
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardMetrics {
    pub total_casos: usize,
    pub casos_urgentes: usize,
    pub porcentaje_urgentes: f64,
    pub zona_rural: usize,
    pub porcentaje_rural: f64,
    pub sin_internet: usize,
    pub porcentaje_sin_internet: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub labels: Vec<String>,
    pub values: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalTrends {
    pub months: Vec<String>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct DistributionRow {
    #[serde(rename = "Label")]
    #[tabled(rename = "Label")]
    pub label: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
    #[serde(rename = "Share")]
    #[tabled(rename = "Share")]
    pub share: String,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub metrics: DashboardMetrics,
    pub categories: Distribution,
    pub urgency: Distribution,
    pub trends: TemporalTrends,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ProblemRow {
    #[tabled(rename = "Problem")]
    pub problem: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Solution")]
    pub solution: String,
    #[tabled(rename = "Estimated time")]
    pub estimated_time: String,
}
