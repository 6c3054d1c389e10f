use crate::types::{
    DashboardMetrics, Dataset, Distribution, DistributionRow, MetricRow, Record, SummaryStats, TemporalTrends,
};
use crate::util::{format_int, format_number, percentage};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_PRIORITY_LIMIT: usize = 20;
pub const MAX_PRIORITY_LIMIT: usize = 1000;

pub fn metrics(data: &Dataset) -> DashboardMetrics {
    let total = data.len();
    let urgent = data.records.iter().filter(|r| r.urgency.is_urgent()).count();
    let rural = data.records.iter().filter(|r| r.rural).count();
    let offline = data.records.iter().filter(|r| !r.internet).count();
    DashboardMetrics {
        total_casos: total,
        casos_urgentes: urgent,
        porcentaje_urgentes: percentage(urgent, total),
        zona_rural: rural,
        porcentaje_rural: percentage(rural, total),
        sin_internet: offline,
        porcentaje_sin_internet: percentage(offline, total),
    }
}

/// Counts per label, highest first; ties keep the order labels first appeared.
fn distribution<'a>(labels: impl Iterator<Item = &'a str>) -> Distribution {
    let mut order: Vec<(&str, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for label in labels {
        match index.get(label) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(label, order.len());
                order.push((label, 1));
            }
        }
    }
    // sort_by is stable
    order.sort_by(|a, b| b.1.cmp(&a.1));
    Distribution {
        labels: order.iter().map(|(l, _)| l.to_string()).collect(),
        values: order.iter().map(|(_, c)| *c).collect(),
    }
}

pub fn category_distribution(data: &Dataset) -> Distribution {
    distribution(data.records.iter().map(|r| r.category.as_str()))
}

pub fn urgency_distribution(data: &Dataset) -> Distribution {
    distribution(data.records.iter().map(|r| r.urgency.label()))
}

/// Reports per `YYYY-MM`, ascending. Undated records are not counted.
pub fn temporal_trends(data: &Dataset) -> TemporalTrends {
    let mut by_month: BTreeMap<String, usize> = BTreeMap::new();
    for date in data.records.iter().filter_map(|r| r.date) {
        *by_month.entry(date.format("%Y-%m").to_string()).or_insert(0) += 1;
    }
    let (months, counts) = by_month.into_iter().unzip();
    TemporalTrends { months, counts }
}

/// The `limit` highest-priority records. `None` means the default limit and
/// anything above the cap is clamped.
pub fn priority_cases(data: &Dataset, limit: Option<usize>) -> Vec<Record> {
    let limit = limit.unwrap_or(DEFAULT_PRIORITY_LIMIT).min(MAX_PRIORITY_LIMIT);
    let mut ranked: Vec<&Record> = data.records.iter().collect();
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));
    ranked.into_iter().take(limit).cloned().collect()
}

pub fn generate_summary(data: &Dataset) -> SummaryStats {
    SummaryStats {
        metrics: metrics(data),
        categories: category_distribution(data),
        urgency: urgency_distribution(data),
        trends: temporal_trends(data),
    }
}

pub fn metric_rows(m: &DashboardMetrics) -> Vec<MetricRow> {
    let row = |metric: &str, value: String| MetricRow { metric: metric.to_string(), value };
    vec![
        row("Total de casos", format_int(m.total_casos)),
        row("Casos urgentes", format!("{} ({}%)", format_int(m.casos_urgentes), format_number(m.porcentaje_urgentes, 1))),
        row("Zona rural", format!("{} ({}%)", format_int(m.zona_rural), format_number(m.porcentaje_rural, 1))),
        row(
            "Sin internet",
            format!("{} ({}%)", format_int(m.sin_internet), format_number(m.porcentaje_sin_internet, 1)),
        ),
    ]
}

pub fn distribution_rows(d: &Distribution) -> Vec<DistributionRow> {
    let total: usize = d.values.iter().sum();
    d.labels
        .iter()
        .zip(&d.values)
        .map(|(label, count)| DistributionRow {
            label: label.clone(),
            count: *count,
            share: format!("{}%", format_number(percentage(*count, total), 1)),
        })
        .collect()
}
