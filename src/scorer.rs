//! Heuristic priority score for a citizen report.
//!
//! The score starts at 50 and adds fixed weights for urgency, rural zone,
//! missing internet access and one of three priority categories.

const BASE_SCORE: i32 = 50;
const URGENT_WEIGHT: i32 = 30;
const RURAL_WEIGHT: i32 = 20;
const NO_INTERNET_WEIGHT: i32 = 15;

/// Category bonuses, first match wins. Each entry lists the dataset spelling
/// and its English equivalent.
const CATEGORY_BONUSES: [(&str, &str, i32); 3] = [
    ("Salud", "Health", 10),
    ("Seguridad", "Security", 8),
    ("Educación", "Education", 5),
];

/// Inclusive score bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

/// Bounds applied to the loaded dashboard dataset.
pub const BASELINE_RANGE: ScoreRange = ScoreRange { min: 20, max: 100 };
/// Bounds applied to uploaded datasets.
pub const UPLOAD_RANGE: ScoreRange = ScoreRange { min: 0, max: 100 };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryMatch {
    Exact,
    IgnoreCase,
}

/// The inputs of the score. An absent factor is simply inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityFactors<'a> {
    pub urgent: bool,
    pub rural: bool,
    pub no_internet: bool,
    pub category: Option<&'a str>,
}

fn category_bonus(category: &str, matching: CategoryMatch) -> i32 {
    let category = category.trim();
    let lowered = category.to_lowercase();
    CATEGORY_BONUSES
        .iter()
        .find(|(es, en, _)| match matching {
            CategoryMatch::Exact => category == *es || category == *en,
            CategoryMatch::IgnoreCase => lowered == es.to_lowercase() || lowered == en.to_lowercase(),
        })
        .map_or(0, |(_, _, bonus)| *bonus)
}

pub fn score(factors: &PriorityFactors<'_>, matching: CategoryMatch, range: ScoreRange) -> u8 {
    let mut total = BASE_SCORE;
    if factors.urgent {
        total += URGENT_WEIGHT;
    }
    if factors.rural {
        total += RURAL_WEIGHT;
    }
    if factors.no_internet {
        total += NO_INTERNET_WEIGHT;
    }
    if let Some(category) = factors.category {
        total += category_bonus(category, matching);
    }
    // Clamped into a u8-sized range, so the cast cannot truncate.
    total.clamp(i32::from(range.min), i32::from(range.max)) as u8
}

/// Score used for the dashboard dataset: exact category labels, [20,100].
pub fn baseline_score(factors: &PriorityFactors<'_>) -> u8 {
    score(factors, CategoryMatch::Exact, BASELINE_RANGE)
}

/// Score used for uploaded datasets: case-insensitive labels, [0,100].
pub fn upload_score(factors: &PriorityFactors<'_>) -> u8 {
    score(factors, CategoryMatch::IgnoreCase, UPLOAD_RANGE)
}
