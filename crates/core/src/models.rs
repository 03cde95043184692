use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const NOT_SPECIFIED: &str = "not specified";
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateRecord {
    pub id: i64,
    #[serde(default)]
    pub fullname: Option<String>,
    #[serde(default, deserialize_with = "lenient_small_int")]
    pub gender_id: Option<i16>,
    #[serde(default, deserialize_with = "lenient_small_int")]
    pub age: Option<i16>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub mobile_phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub desired_position_name: Option<String>,
    #[serde(default)]
    pub profession_name_1: Option<String>,
    #[serde(default)]
    pub profession_name_2: Option<String>,
    #[serde(default, deserialize_with = "lenient_small_int")]
    pub exp_years: Option<i16>,
    #[serde(default)]
    pub cv_summary_desc: Option<String>,
    #[serde(default)]
    pub last_job_position_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub last_job_finished: Option<bool>,
    #[serde(default)]
    pub last_comment: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    pub creation_date: Option<NaiveDate>,
}

pub const CANDIDATE_COLUMNS: [&str; 17] = [
    "id",
    "fullname",
    "gender_id",
    "age",
    "location_name",
    "mobile_phone",
    "email",
    "desired_position_name",
    "profession_name_1",
    "profession_name_2",
    "exp_years",
    "cv_summary_desc",
    "last_job_position_name",
    "last_job_finished",
    "last_comment",
    "html",
    "creation_date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    Intern,
    Junior,
    Middle,
    Senior,
    Lead,
    Head,
}

impl Grade {
    pub const ALL: [Grade; 6] = [
        Grade::Intern,
        Grade::Junior,
        Grade::Middle,
        Grade::Senior,
        Grade::Lead,
        Grade::Head,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::Intern => "Intern",
            Grade::Junior => "Junior",
            Grade::Middle => "Middle",
            Grade::Senior => "Senior",
            Grade::Lead => "Lead",
            Grade::Head => "Head",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .into_iter()
            .find(|grade| grade.as_str() == value)
            .ok_or_else(|| format!("unknown grade {value:?}, expected one of Intern|Junior|Middle|Senior|Lead|Head"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    Native,
}

impl FromStr for LanguageLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "A1" => Ok(LanguageLevel::A1),
            "A2" => Ok(LanguageLevel::A2),
            "B1" => Ok(LanguageLevel::B1),
            "B2" => Ok(LanguageLevel::B2),
            "C1" => Ok(LanguageLevel::C1),
            "C2" => Ok(LanguageLevel::C2),
            "Native" => Ok(LanguageLevel::Native),
            other => Err(format!(
                "unknown language level {other:?}, expected one of A1|A2|B1|B2|C1|C2|Native"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageSkill {
    pub name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub level: Option<LanguageLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    pub candidate_id: i64,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub positions: Vec<String>,
    #[serde(default)]
    pub experience_years: Option<f64>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub hard_skills: Vec<String>,
    #[serde(default)]
    pub domain_skills: Vec<String>,
    #[serde(default)]
    pub performed_tasks: Vec<String>,
    #[serde(default)]
    pub languages: Vec<LanguageSkill>,
    pub embedding_text: String,
}

impl CandidateMetadata {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(years) = self.experience_years {
            if !years.is_finite() || years < 0.0 {
                return Err(format!("experience_years must be >= 0, got {years}"));
            }
        }
        if self.embedding_text.trim().is_empty() {
            return Err("embedding_text must be a non-empty string".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub candidate_id: i64,
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl IndexedDocument {
    pub fn experience_years(&self) -> Option<f64> {
        self.metadata.get("experience_years").and_then(Value::as_f64)
    }

    pub fn grade(&self) -> Option<&str> {
        self.metadata.get("grade").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub experience_years_min: Option<f64>,
    pub grade: Option<Grade>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.experience_years_min.is_none() && self.grade.is_none()
    }

    pub fn matches(&self, document: &IndexedDocument) -> bool {
        let experience_ok = match self.experience_years_min {
            Some(min) => document.experience_years().is_some_and(|years| years >= min),
            None => true,
        };
        let grade_ok = match self.grade {
            Some(grade) => document.grade() == Some(grade.as_str()),
            None => true,
        };
        experience_ok && grade_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedMatch {
    pub document: IndexedDocument,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub name: String,
    pub phone: String,
    pub location: String,
    #[serde(deserialize_with = "lenient_score")]
    pub hard_skills_score: u8,
    #[serde(deserialize_with = "lenient_score")]
    pub domain_skills_score: u8,
    #[serde(deserialize_with = "lenient_score")]
    pub relevance_score: u8,
    pub relevance_explanation: String,
}

impl CandidateEvaluation {
    pub fn validate(&self) -> Result<(), String> {
        for (field, score) in [
            ("hard_skills_score", self.hard_skills_score),
            ("domain_skills_score", self.domain_skills_score),
            ("relevance_score", self.relevance_score),
        ] {
            if !(1..=10).contains(&score) {
                return Err(format!("{field} must be within 1..=10, got {score}"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub vacancy_description: String,
    pub k: usize,
    pub experience_years_min: Option<f64>,
    pub grade: Option<Grade>,
}

impl SearchRequest {
    pub fn new(vacancy_description: impl Into<String>, k: usize) -> Self {
        Self {
            vacancy_description: vacancy_description.into(),
            k,
            experience_years_min: None,
            grade: None,
        }
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            experience_years_min: self.experience_years_min,
            grade: self.grade,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.vacancy_description.trim().is_empty() {
            return Err("vacancy description is empty".to_string());
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&self.k) {
            return Err(format!(
                "k must be within {MIN_TOP_K}..={MAX_TOP_K}, got {}",
                self.k
            ));
        }
        if self.experience_years_min.is_some_and(|years| years < 0.0) {
            return Err("experience_years_min must be >= 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub collection_name: String,
    pub exists: bool,
    pub points_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ok: bool,
    pub error: Option<String>,
}

impl ComponentHealth {
    pub fn up() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn down(error: impl fmt::Display) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub vector_store: ComponentHealth,
    pub database: ComponentHealth,
}

impl HealthStatus {
    pub fn vector_store_ok(&self) -> bool {
        self.vector_store.ok
    }

    pub fn db_ok(&self) -> bool {
        self.database.ok
    }

    pub fn is_healthy(&self) -> bool {
        self.vector_store.ok && self.database.ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub attempted: usize,
    pub extracted: usize,
    pub indexed: usize,
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr<Err = String>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// Export files carry numbers as ints, floats or strings depending on the producer.
fn lenient_small_int<'de, D>(deserializer: D) -> Result<Option<i16>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let number = match raw {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a number, got {other}"
            )))
        }
    };
    Ok(number
        .filter(|value| value.is_finite())
        .map(|value| value.trunc())
        .filter(|value| *value >= f64::from(i16::MIN) && *value <= f64::from(i16::MAX))
        .map(|value| value as i16))
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(flag)),
        Some(Value::Number(number)) => Ok(number.as_f64().map(|value| value != 0.0)),
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "" | "nan" => Ok(None),
            "true" | "yes" => Ok(Some(true)),
            "false" | "no" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {other}"
            ))),
        },
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean, got {other}"
        ))),
    }
}

// Models sometimes quote scores or emit them as `8.0`.
fn lenient_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let number = match &raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(value) if value.fract() == 0.0 && (0.0..=255.0).contains(&value) => Ok(value as u8),
        _ => Err(serde::de::Error::custom(format!(
            "expected an integer score, got {raw}"
        ))),
    }
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(serde::de::Error::custom)
}
