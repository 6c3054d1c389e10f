//! Rule-based problem detection over a dataset, with canned solutions and a
//! time-horizon action plan.

use crate::reports::{category_distribution, metrics};
use crate::types::{Dataset, ProblemRow};
use crate::util::{days_diff, percentage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

const MIN_ROWS: usize = 10;
const HIGH_URGENCY_PCT: f64 = 50.0;
const RURAL_PCT: f64 = 30.0;
const OFFLINE_PCT: f64 = 40.0;
const CATEGORY_SHARE_PCT: f64 = 60.0;
const STALE_DAYS: i64 = 30;
const MISSING_PCT: f64 = 20.0;

/// Shared scale for problem severity and solution priority. Declaration
/// order is rank order, most pressing first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub id: &'static str,
    pub title: &'static str,
    pub description: String,
    pub severity: Level,
    pub category: &'static str,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Solution {
    pub title: &'static str,
    pub description: &'static str,
    pub priority: Level,
    pub estimated_time: &'static str,
    pub steps: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionItem {
    pub problem_id: &'static str,
    pub problem_title: &'static str,
    pub solution_title: &'static str,
    pub description: &'static str,
    pub estimated_time: &'static str,
    pub priority: Level,
    pub severity: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionPlan {
    pub immediate_actions: Vec<ActionItem>,
    pub short_term_actions: Vec<ActionItem>,
    pub medium_term_actions: Vec<ActionItem>,
    pub long_term_actions: Vec<ActionItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProblemReport {
    pub problems: Vec<Problem>,
    pub solutions: BTreeMap<&'static str, Solution>,
    pub action_plan: ActionPlan,
    pub total_problems: usize,
    pub critical_problems: usize,
    pub analysis_timestamp: DateTime<Utc>,
}

fn problem(
    id: &'static str,
    title: &'static str,
    severity: Level,
    category: &'static str,
    description: String,
    impact: String,
) -> Problem {
    Problem { id, title, description, severity, category, impact }
}

/// Rows that repeat every field except the identifier.
fn duplicate_rows(data: &Dataset) -> usize {
    let mut seen = HashSet::new();
    data.records
        .iter()
        .filter(|r| {
            !seen.insert((&r.city, &r.category, r.urgency, r.rural, r.internet, r.priority, r.date, &r.extra))
        })
        .count()
}

/// Run every check in order. An empty dataset yields only `no_data`.
pub fn detect(data: &Dataset, today: NaiveDate) -> Vec<Problem> {
    if data.is_empty() {
        return vec![problem(
            "no_data",
            "Sin datos disponibles",
            Level::Critical,
            "Datos",
            "El conjunto de datos no contiene registros".to_string(),
            "No es posible generar ningún análisis".to_string(),
        )];
    }

    let total = data.len();
    let m = metrics(data);
    let mut found = Vec::new();

    if total < MIN_ROWS {
        found.push(problem(
            "insufficient_data",
            "Datos insuficientes",
            Level::Medium,
            "Datos",
            format!("Solo hay {total} registros; se recomiendan al menos {MIN_ROWS}"),
            "Las estadísticas pueden no ser representativas".to_string(),
        ));
    }

    if m.porcentaje_urgentes > HIGH_URGENCY_PCT {
        found.push(problem(
            "high_urgency",
            "Alto volumen de casos urgentes",
            Level::Critical,
            "Atención ciudadana",
            format!("{}% de los casos están marcados como urgentes", m.porcentaje_urgentes),
            format!("{} ciudadanos esperan respuesta inmediata", m.casos_urgentes),
        ));
    }

    if m.porcentaje_rural > RURAL_PCT {
        found.push(problem(
            "rural_concentration",
            "Concentración de casos en zona rural",
            Level::High,
            "Cobertura territorial",
            format!("{}% de los casos provienen de zonas rurales", m.porcentaje_rural),
            format!("{} casos con acceso limitado a servicios", m.zona_rural),
        ));
    }

    if m.porcentaje_sin_internet > OFFLINE_PCT {
        found.push(problem(
            "connectivity_gap",
            "Brecha de conectividad",
            Level::High,
            "Conectividad",
            format!("{}% de los ciudadanos no tienen acceso a internet", m.porcentaje_sin_internet),
            format!("{} ciudadanos sin canales digitales de atención", m.sin_internet),
        ));
    }

    let categories = category_distribution(data);
    if let (Some(label), Some(count)) = (categories.labels.first(), categories.values.first()) {
        let share = percentage(*count, total);
        if share > CATEGORY_SHARE_PCT {
            found.push(problem(
                "category_imbalance",
                "Desbalance entre categorías",
                Level::Medium,
                "Distribución",
                format!("La categoría '{label}' concentra el {share}% de los casos"),
                "Otras necesidades pueden estar subrepresentadas".to_string(),
            ));
        }
    }

    if let Some(latest) = data.records.iter().filter_map(|r| r.date).max() {
        let age = days_diff(latest, today);
        if age > STALE_DAYS {
            found.push(problem(
                "stale_data",
                "Datos desactualizados",
                Level::Medium,
                "Calidad de datos",
                format!("El reporte más reciente es del {latest} ({age} días atrás)"),
                "Las decisiones se basan en información antigua".to_string(),
            ));
        }
    }

    let missing = percentage(data.missing_cells(), total * data.column_count());
    if missing > MISSING_PCT {
        found.push(problem(
            "missing_data",
            "Datos incompletos",
            Level::High,
            "Calidad de datos",
            format!("{missing}% de las celdas están vacías"),
            "Los indicadores pueden estar sesgados".to_string(),
        ));
    }

    let duplicates = duplicate_rows(data);
    if duplicates > 0 {
        found.push(problem(
            "duplicate_records",
            "Registros duplicados",
            Level::Low,
            "Calidad de datos",
            format!("Se encontraron {duplicates} registros repetidos"),
            "Los conteos pueden estar inflados".to_string(),
        ));
    }

    debug!(total, problems = found.len(), "problem detection finished");
    found
}

pub fn solution_for(problem_id: &str) -> Solution {
    match problem_id {
        "no_data" => Solution {
            title: "Cargar un conjunto de datos",
            description: "Importar reportes ciudadanos antes de generar análisis",
            priority: Level::Critical,
            estimated_time: "Inmediato",
            steps: &["Verificar la ruta del archivo de datos", "Subir un archivo CSV o Excel", "Reiniciar el análisis"],
        },
        "insufficient_data" => Solution {
            title: "Ampliar la recolección de reportes",
            description: "Habilitar más canales para recibir reportes ciudadanos",
            priority: Level::Medium,
            estimated_time: "2-4 semanas",
            steps: &["Difundir los canales de reporte", "Integrar fuentes adicionales", "Repetir el análisis"],
        },
        "high_urgency" => Solution {
            title: "Activar protocolo de respuesta rápida",
            description: "Asignar equipos dedicados a los casos urgentes",
            priority: Level::Critical,
            estimated_time: "Inmediato",
            steps: &["Priorizar los casos urgentes", "Asignar responsables", "Hacer seguimiento diario"],
        },
        "rural_concentration" => Solution {
            title: "Fortalecer la presencia en zonas rurales",
            description: "Desplegar unidades móviles y puntos de atención rurales",
            priority: Level::High,
            estimated_time: "3-6 meses",
            steps: &["Mapear las veredas afectadas", "Planear rutas de unidades móviles", "Establecer puntos de atención"],
        },
        "connectivity_gap" => Solution {
            title: "Habilitar canales de atención sin internet",
            description: "Ofrecer líneas telefónicas, SMS y puntos presenciales",
            priority: Level::High,
            estimated_time: "6-12 meses",
            steps: &["Habilitar una línea telefónica", "Implementar reportes por SMS", "Gestionar conectividad con operadores"],
        },
        "category_imbalance" => Solution {
            title: "Revisar la clasificación de categorías",
            description: "Auditar la categorización y atender la categoría dominante",
            priority: Level::Medium,
            estimated_time: "4-6 semanas",
            steps: &["Auditar una muestra de reportes", "Ajustar la taxonomía", "Reforzar la atención en la categoría dominante"],
        },
        "stale_data" => Solution {
            title: "Actualizar la fuente de datos",
            description: "Programar la carga periódica de reportes recientes",
            priority: Level::Medium,
            estimated_time: "1-2 semanas",
            steps: &["Obtener el último corte de datos", "Automatizar la actualización"],
        },
        "missing_data" => Solution {
            title: "Mejorar la calidad de captura",
            description: "Hacer obligatorios los campos clave en los formularios",
            priority: Level::High,
            estimated_time: "2-4 semanas",
            steps: &["Identificar los campos vacíos", "Validar formularios en origen", "Completar registros existentes"],
        },
        "duplicate_records" => Solution {
            title: "Depurar registros duplicados",
            description: "Eliminar duplicados y validar la unicidad al cargar",
            priority: Level::Low,
            estimated_time: "1-2 semanas",
            steps: &["Identificar duplicados", "Consolidar registros", "Agregar validación de unicidad"],
        },
        _ => Solution {
            title: "Revisión manual",
            description: "Analizar el problema con el equipo responsable",
            priority: Level::Medium,
            estimated_time: "Por definir",
            steps: &["Revisar el caso con el equipo"],
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizon {
    Immediate,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

fn horizon(estimated_time: &str) -> Horizon {
    if estimated_time.contains("Inmediato") {
        Horizon::Immediate
    } else if estimated_time.contains("semanas") {
        if ["1-2", "1-4", "2-4"].iter().any(|r| estimated_time.contains(r)) {
            Horizon::ShortTerm
        } else {
            Horizon::MediumTerm
        }
    } else if estimated_time.contains("meses") {
        Horizon::LongTerm
    } else {
        Horizon::MediumTerm
    }
}

pub fn action_plan(problems: &[Problem]) -> ActionPlan {
    let mut plan = ActionPlan::default();
    for p in problems {
        let s = solution_for(p.id);
        let item = ActionItem {
            problem_id: p.id,
            problem_title: p.title,
            solution_title: s.title,
            description: s.description,
            estimated_time: s.estimated_time,
            priority: s.priority,
            severity: p.severity,
        };
        match horizon(s.estimated_time) {
            Horizon::Immediate => plan.immediate_actions.push(item),
            Horizon::ShortTerm => plan.short_term_actions.push(item),
            Horizon::MediumTerm => plan.medium_term_actions.push(item),
            Horizon::LongTerm => plan.long_term_actions.push(item),
        }
    }
    for bucket in [
        &mut plan.immediate_actions,
        &mut plan.short_term_actions,
        &mut plan.medium_term_actions,
        &mut plan.long_term_actions,
    ] {
        bucket.sort_by_key(|a| (a.priority, a.severity));
    }
    plan
}

/// Full pipeline: detection, solution lookup and action plan.
pub fn analyze_problems(data: &Dataset, now: DateTime<Utc>) -> ProblemReport {
    let problems = detect(data, now.date_naive());
    let solutions = problems.iter().map(|p| (p.id, solution_for(p.id))).collect();
    let action_plan = action_plan(&problems);
    ProblemReport {
        total_problems: problems.len(),
        critical_problems: problems.iter().filter(|p| p.severity == Level::Critical).count(),
        problems,
        solutions,
        action_plan,
        analysis_timestamp: now,
    }
}

/// One table row per detected problem, for terminal output.
pub fn problem_rows(report: &ProblemReport) -> Vec<ProblemRow> {
    report
        .problems
        .iter()
        .map(|p| {
            let s = solution_for(p.id);
            ProblemRow {
                problem: p.title.to_string(),
                severity: format!("{:?}", p.severity).to_lowercase(),
                solution: s.title.to_string(),
                estimated_time: s.estimated_time.to_string(),
            }
        })
        .collect()
}
