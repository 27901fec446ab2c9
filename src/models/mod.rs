use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveyAggregate {
    pub survey_id: String,
    pub title: String,
    pub description: String,
    // Informational only, the presenter sums per-question counts instead
    pub total_responses: u64,
    pub questions: Vec<QuestionAggregate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAggregate {
    pub question_id: String,
    pub question_text: String,
    pub response_count: u64,
    pub results: QuestionResults,
}

/// Type-specific payload of a question, tagged by the question type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionResults {
    MultipleChoice {
        options: Option<Vec<OptionCount>>,
    },
    Rating {
        average_rating: Option<f64>,
        distribution: Option<Vec<RatingBucket>>,
    },
    Text {
        responses: Vec<TextResponse>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    MultipleChoice,
    Rating,
    Text,
}

impl QuestionKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "multiple-choice" | "multiple_choice" => Some(QuestionKind::MultipleChoice),
            "rating" => Some(QuestionKind::Rating),
            "text" => Some(QuestionKind::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::Rating => "rating",
            QuestionKind::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCount {
    #[serde(default, deserialize_with = "null_as_default")]
    pub option_text: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingBucket {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer_value: String,
    #[serde(deserialize_with = "flexible_timestamp")]
    pub submitted_at: DateTime<Utc>,
}

impl QuestionAggregate {
    pub fn kind(&self) -> QuestionKind {
        match self.results {
            QuestionResults::MultipleChoice { .. } => QuestionKind::MultipleChoice,
            QuestionResults::Rating { .. } => QuestionKind::Rating,
            QuestionResults::Text { .. } => QuestionKind::Text,
        }
    }
}

// Wire shapes, normalized into the types above by `decode_survey`

#[derive(Deserialize)]
struct RawSurvey {
    #[serde(default, deserialize_with = "flexible_id")]
    survey_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    total_responses: u64,
    #[serde(default)]
    questions: Option<Vec<RawQuestion>>,
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(default, deserialize_with = "optional_id")]
    question_id: Option<String>,
    // Some backends send the record key alongside, or instead of, question_id
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    question_text: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    response_count: u64,
    #[serde(default)]
    options: Option<Vec<OptionCount>>,
    #[serde(default)]
    average_rating: Option<f64>,
    #[serde(default)]
    distribution: Option<HashMap<String, Option<u64>>>,
    #[serde(default)]
    responses: Option<Vec<TextResponse>>,
}

fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_id(deserializer)?.unwrap_or_default())
}

/// Accepts ids sent either as strings or as numbers.
fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Id>::deserialize(deserializer)? {
        Some(Id::Text(s)) => Some(s),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

// RFC 3339 first, then a bare ISO-8601 local time taken as UTC
fn flexible_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn decode_survey(text: &str) -> Result<SurveyAggregate, DecodeError> {
    decode_survey_bytes(text.as_bytes())
}

// All or nothing: a missing questions array or an unknown type rejects the payload
pub fn decode_survey_bytes(bytes: &[u8]) -> Result<SurveyAggregate, DecodeError> {
    let raw: RawSurvey = serde_json::from_slice(bytes)?;
    let raw_questions = raw.questions.ok_or(DecodeError::MissingQuestions)?;

    let questions = raw_questions
        .into_iter()
        .map(normalize_question)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SurveyAggregate {
        survey_id: raw.survey_id,
        title: raw.title,
        description: raw.description,
        total_responses: raw.total_responses,
        questions,
    })
}

fn normalize_question(raw: RawQuestion) -> Result<QuestionAggregate, DecodeError> {
    let question_id = raw
        .question_id
        .or(raw.id)
        .ok_or(DecodeError::MissingQuestionId)?;
    let kind = QuestionKind::parse(&raw.kind).ok_or_else(|| DecodeError::UnknownType {
        question_id: question_id.clone(),
        kind: raw.kind.clone(),
    })?;

    let results = match kind {
        QuestionKind::MultipleChoice => QuestionResults::MultipleChoice {
            options: raw.options,
        },
        QuestionKind::Rating => QuestionResults::Rating {
            average_rating: raw.average_rating,
            distribution: raw.distribution.map(|distribution| {
                order_distribution(
                    distribution
                        .into_iter()
                        .map(|(label, count)| (label, count.unwrap_or_default()))
                        .collect(),
                )
            }),
        },
        QuestionKind::Text => QuestionResults::Text {
            responses: raw.responses.unwrap_or_default(),
        },
    };

    Ok(QuestionAggregate {
        question_id,
        question_text: raw.question_text,
        response_count: raw.response_count,
        results,
    })
}

// Numeric labels ascending by value, then the rest lexically
fn order_distribution(distribution: HashMap<String, u64>) -> Vec<RatingBucket> {
    let mut buckets: Vec<RatingBucket> = distribution
        .into_iter()
        .map(|(label, count)| RatingBucket { label, count })
        .collect();

    buckets.sort_by(|a, b| {
        match (a.label.trim().parse::<f64>(), b.label.trim().parse::<f64>()) {
            (Ok(x), Ok(y)) => x
                .partial_cmp(&y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => a.label.cmp(&b.label),
        }
    });
    buckets
}
