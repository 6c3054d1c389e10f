//! Keyword heuristics over the free-text columns of an uploaded table.
//!
//! Every number produced here comes from substring matching against fixed
//! word lists. The confidence values are synthetic: they are derived from
//! the match counts by fixed formulas, not measured against ground truth.

use crate::normalizer::{normalize_urgency, ColumnMapping};
use crate::scorer::upload_score;
use crate::upload::RawTable;
use crate::util::{average, format_int, parse_f64_safe, percentage, round1};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Name of the column appended with the per-row heuristic priority.
pub const HEURISTIC_PRIORITY_COLUMN: &str = "Prioridad_IA";

const TEXT_COLUMN_HINTS: [&str; 5] = ["comentario", "descripcion", "descripción", "texto", "mensaje"];
const URGENCY_COLUMN_HINT: &str = "urgencia";

const CATEGORY_KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "Salud",
        &["salud", "hospital", "médico", "medico", "doctor", "medicamento", "clínica", "clinica", "enfermedad", "ambulancia", "health", "medicine"],
    ),
    (
        "Educación",
        &["educación", "educacion", "escuela", "colegio", "profesor", "estudiante", "libro", "universidad", "computador", "school", "teacher", "education"],
    ),
    (
        "Seguridad",
        &["seguridad", "robo", "asalto", "policía", "policia", "delincuencia", "violencia", "oscura", "crime", "security", "theft"],
    ),
    (
        "Medio Ambiente",
        &["ambiente", "basura", "contaminación", "contaminacion", "contaminado", "reciclaje", "río", "parque", "árbol", "pollution", "trash", "environment"],
    ),
    (
        "Transporte",
        &["transporte", "bus", "metro", "taxi", "tráfico", "trafico", "ciclovía", "ciclovia", "carretera", "traffic", "transport"],
    ),
    (
        "Servicios Públicos",
        &["agua", "luz", "energía", "energia", "gas", "alcantarillado", "servicio", "electricidad", "water", "electricity"],
    ),
];

const URGENCY_KEYWORDS: [&str; 15] = [
    "urgente", "urgencia", "emergencia", "inmediato", "inmediata", "crítico", "critico", "crítica", "critica", "grave",
    "peligro", "urgent", "emergency", "critical", "asap",
];
const URGENCY_NEGATIONS: [&str; 4] = ["no urgente", "no es urgente", "sin urgencia", "not urgent"];

const POSITIVE_KEYWORDS: [&str; 14] = [
    "bueno", "buena", "excelente", "gracias", "mejor", "satisfecho", "feliz", "agradezco", "bien", "good", "great",
    "excellent", "thanks", "happy",
];
const NEGATIVE_KEYWORDS: [&str; 19] = [
    "malo", "mala", "terrible", "pésimo", "pesimo", "problema", "no hay", "falta", "peor", "queja", "contaminado",
    "robo", "caro", "lejos", "no funciona", "bad", "poor", "worst", "broken",
];

const HIGH_PRIORITY: u8 = 80;
const MEDIUM_PRIORITY: u8 = 60;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoriesAnalysis {
    pub detected: Vec<CategoryCount>,
    pub total_categories: usize,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrgencyAnalysis {
    pub urgent_cases: usize,
    pub urgency_percentage: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentAnalysis {
    pub positive_cases: usize,
    pub negative_cases: usize,
    pub neutral_cases: usize,
    pub sentiment_score: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityAnalysis {
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub average_priority: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQuality {
    pub total_cells: usize,
    pub missing_cells: usize,
    pub missing_percentage: f64,
    pub duplicate_rows: usize,
    pub completeness: f64,
    pub quality_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    pub file_name: String,
    pub total_records: usize,
    pub total_columns: usize,
    pub columns: Vec<String>,
    pub text_columns: Vec<String>,
    pub categories_analysis: CategoriesAnalysis,
    pub urgency_analysis: UrgencyAnalysis,
    pub sentiment_analysis: SentimentAnalysis,
    pub priority_analysis: PriorityAnalysis,
    pub data_quality: DataQuality,
    pub insights: Vec<String>,
    /// Mean of the three synthetic confidences. Not an accuracy measurement.
    pub heuristic_confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Metrics view rendered by the custom dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomMetrics {
    pub analysis_id: String,
    pub file_name: String,
    pub total_casos: usize,
    pub casos_urgentes: usize,
    pub porcentaje_urgentes: f64,
    pub alta_prioridad: usize,
    pub media_prioridad: usize,
    pub baja_prioridad: usize,
    pub calidad_datos: f64,
    pub completitud: f64,
    pub casos_positivos: usize,
    pub casos_negativos: usize,
    pub categorias_detectadas: usize,
    pub heuristic_confidence: f64,
    pub insights: Vec<String>,
}

impl AnalysisResult {
    pub fn custom_metrics(&self) -> CustomMetrics {
        CustomMetrics {
            analysis_id: self.analysis_id.clone(),
            file_name: self.file_name.clone(),
            total_casos: self.total_records,
            casos_urgentes: self.urgency_analysis.urgent_cases,
            porcentaje_urgentes: self.urgency_analysis.urgency_percentage,
            alta_prioridad: self.priority_analysis.high_priority,
            media_prioridad: self.priority_analysis.medium_priority,
            baja_prioridad: self.priority_analysis.low_priority,
            calidad_datos: self.data_quality.quality_score,
            completitud: self.data_quality.completeness,
            casos_positivos: self.sentiment_analysis.positive_cases,
            casos_negativos: self.sentiment_analysis.negative_cases,
            categorias_detectadas: self.categories_analysis.total_categories,
            heuristic_confidence: self.heuristic_confidence,
            insights: self.insights.clone(),
        }
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// A column is text-typed when most of its non-empty cells are not numbers.
fn is_text_column(table: &RawTable, idx: usize) -> bool {
    let (mut filled, mut textual) = (0usize, 0usize);
    for value in table.column(idx).filter(|v| !v.trim().is_empty()) {
        filled += 1;
        if parse_f64_safe(Some(value)).is_none() {
            textual += 1;
        }
    }
    filled > 0 && textual * 2 > filled
}

pub fn text_columns(table: &RawTable) -> Vec<usize> {
    table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| contains_any(&name.to_lowercase(), &TEXT_COLUMN_HINTS))
        .filter(|(idx, _)| is_text_column(table, *idx))
        .map(|(idx, _)| idx)
        .collect()
}

fn is_urgent_text(text: &str) -> bool {
    contains_any(text, &URGENCY_KEYWORDS) && !contains_any(text, &URGENCY_NEGATIONS)
}

fn analyze_categories(lowered_rows: &[Vec<String>]) -> CategoriesAnalysis {
    let detected: Vec<CategoryCount> = CATEGORY_KEYWORDS
        .iter()
        .map(|(category, keywords)| CategoryCount {
            category: category.to_string(),
            count: lowered_rows
                .iter()
                .filter(|cells| cells.iter().any(|c| contains_any(c, keywords)))
                .count(),
        })
        .filter(|c| c.count > 0)
        .collect();
    let found = detected.len();
    CategoriesAnalysis {
        detected,
        total_categories: found,
        confidence: (found as f64 * 15.0).clamp(60.0, 95.0),
    }
}

fn analyze_urgency(table: &RawTable, lowered_rows: &[Vec<String>]) -> UrgencyAnalysis {
    let urgency_columns: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, name)| name.to_lowercase().contains(URGENCY_COLUMN_HINT))
        .map(|(idx, _)| idx)
        .collect();

    let urgent_cases = table
        .rows
        .iter()
        .zip(lowered_rows)
        .filter(|(row, text_cells)| {
            let labelled = urgency_columns.iter().any(|&i| {
                let value = row[i].to_lowercase();
                normalize_urgency(&value).is_urgent() || is_urgent_text(&value)
            });
            labelled || text_cells.iter().any(|c| is_urgent_text(c))
        })
        .count();

    let urgency_percentage = percentage(urgent_cases, table.rows.len());
    UrgencyAnalysis {
        urgent_cases,
        urgency_percentage,
        confidence: (urgency_percentage + 20.0).clamp(70.0, 95.0),
    }
}

fn analyze_sentiment(lowered_rows: &[Vec<String>]) -> SentimentAnalysis {
    // Each dimension counts independently; a mixed row counts toward both.
    let (mut positive, mut negative, mut neutral) = (0usize, 0usize, 0usize);
    for cells in lowered_rows {
        let pos = cells.iter().any(|c| contains_any(c, &POSITIVE_KEYWORDS));
        let neg = cells.iter().any(|c| contains_any(c, &NEGATIVE_KEYWORDS));
        positive += usize::from(pos);
        negative += usize::from(neg);
        neutral += usize::from(!pos && !neg);
    }
    let matched = positive + negative;
    let sentiment_score = if matched == 0 {
        0.0
    } else {
        round1((positive as f64 - negative as f64) / matched as f64 * 100.0)
    };
    SentimentAnalysis {
        positive_cases: positive,
        negative_cases: negative,
        neutral_cases: neutral,
        sentiment_score,
        confidence: (sentiment_score.abs() + 40.0).clamp(60.0, 95.0),
    }
}

fn analyze_priority(scores: &[u8]) -> PriorityAnalysis {
    let values: Vec<f64> = scores.iter().map(|s| f64::from(*s)).collect();
    PriorityAnalysis {
        high_priority: scores.iter().filter(|s| **s >= HIGH_PRIORITY).count(),
        medium_priority: scores.iter().filter(|s| (MEDIUM_PRIORITY..HIGH_PRIORITY).contains(*s)).count(),
        low_priority: scores.iter().filter(|s| **s < MEDIUM_PRIORITY).count(),
        average_priority: round1(average(&values)),
    }
}

pub fn data_quality(table: &RawTable) -> DataQuality {
    let total_cells = table.rows.len() * table.headers.len();
    let missing_cells = table
        .rows
        .iter()
        .flat_map(|row| row.iter())
        .filter(|cell| cell.trim().is_empty())
        .count();

    let mut seen: HashSet<&Vec<String>> = HashSet::new();
    let duplicate_rows = table.rows.iter().filter(|row| !seen.insert(*row)).count();

    let missing_percentage = percentage(missing_cells, total_cells);
    let completeness = round1(100.0 - missing_percentage);
    let duplicate_percentage = percentage(duplicate_rows, table.rows.len());
    DataQuality {
        total_cells,
        missing_cells,
        missing_percentage,
        duplicate_rows,
        completeness,
        quality_score: round1((completeness - duplicate_percentage).max(0.0)),
    }
}

fn build_insights(
    total: usize,
    categories: &CategoriesAnalysis,
    urgency: &UrgencyAnalysis,
    sentiment: &SentimentAnalysis,
    priority: &PriorityAnalysis,
    quality: &DataQuality,
) -> Vec<String> {
    let mut insights = Vec::new();

    if urgency.urgency_percentage > 30.0 {
        insights.push(format!(
            "Alto nivel de urgencia: {}% de los casos requieren atención inmediata",
            urgency.urgency_percentage
        ));
    } else if urgency.urgency_percentage < 10.0 {
        insights.push(format!("Bajo nivel de urgencia: solo {}% de los casos son urgentes", urgency.urgency_percentage));
    }

    if priority.high_priority * 2 > total {
        insights.push(format!("La mayoría de los casos ({}) tienen prioridad alta", priority.high_priority));
    }

    if sentiment.positive_cases > sentiment.negative_cases {
        insights.push(format!(
            "Sentimiento predominantemente positivo: {} casos positivos frente a {} negativos",
            sentiment.positive_cases, sentiment.negative_cases
        ));
    } else if sentiment.negative_cases > sentiment.positive_cases {
        insights.push(format!(
            "Sentimiento predominantemente negativo: {} casos negativos frente a {} positivos",
            sentiment.negative_cases, sentiment.positive_cases
        ));
    }

    if quality.quality_score > 90.0 {
        insights.push(format!("Excelente calidad de datos: {}%", quality.quality_score));
    } else if quality.quality_score < 70.0 {
        insights.push(format!("Calidad de datos mejorable: {}%", quality.quality_score));
    }

    if total > 1000 {
        insights.push(format!("Dataset extenso con {} registros", format_int(total)));
    }

    if let Some(top) = categories.detected.iter().max_by(|a, b| a.count.cmp(&b.count).then(b.category.cmp(&a.category))) {
        insights.push(format!("Categoría más mencionada: {} ({} casos)", top.category, top.count));
    }

    insights
}

/// Run every heuristic over `table`.
///
/// Appends the `Prioridad_IA` column to `table` as a side effect.
pub fn analyze(analysis_id: &str, file_name: &str, table: &mut RawTable) -> AnalysisResult {
    let quality = data_quality(table);
    let text_idx = text_columns(table);

    let lowered_rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| text_idx.iter().map(|&i| row[i].to_lowercase()).collect())
        .collect();

    let categories = analyze_categories(&lowered_rows);
    let urgency = analyze_urgency(table, &lowered_rows);
    let sentiment = analyze_sentiment(&lowered_rows);

    let mapping = ColumnMapping::resolve(&table.headers);
    let scores: Vec<u8> = table.rows.iter().map(|row| upload_score(&mapping.factors(row))).collect();
    let priority = analyze_priority(&scores);
    table.push_column(HEURISTIC_PRIORITY_COLUMN, scores.iter().map(u8::to_string).collect());

    let total = table.rows.len();
    let insights = build_insights(total, &categories, &urgency, &sentiment, &priority, &quality);
    let heuristic_confidence = round1((categories.confidence + urgency.confidence + sentiment.confidence) / 3.0);

    AnalysisResult {
        analysis_id: analysis_id.to_string(),
        file_name: file_name.to_string(),
        total_records: total,
        total_columns: table.headers.len(),
        columns: table.headers.clone(),
        text_columns: text_idx.iter().map(|&i| table.headers[i].clone()).collect(),
        categories_analysis: categories,
        urgency_analysis: urgency,
        sentiment_analysis: sentiment,
        priority_analysis: priority,
        data_quality: quality,
        insights,
        heuristic_confidence,
        created_at: Utc::now(),
    }
}
