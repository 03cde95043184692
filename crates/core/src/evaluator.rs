use crate::error::SearchError;
use crate::llm::{fenced_body, ChatMessage, ChatOptions};
use crate::models::{CandidateEvaluation, CandidateRecord, IndexedDocument, NOT_SPECIFIED};
use crate::prompts;
use crate::traits::ChatModel;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
pub struct CandidateEvaluator {
    chat: Arc<dyn ChatModel>,
    options: ChatOptions,
}

impl CandidateEvaluator {
    pub fn new(chat: Arc<dyn ChatModel>, options: ChatOptions) -> Self {
        Self { chat, options }
    }

    pub async fn evaluate(
        &self,
        vacancy_description: &str,
        contexts: &[String],
    ) -> Result<Vec<CandidateEvaluation>, SearchError> {
        if contexts.is_empty() {
            return Ok(Vec::new());
        }

        info!(candidates = contexts.len(), "requesting candidate evaluation");
        let prompt = prompts::evaluation_prompt(vacancy_description, contexts);
        let response = self
            .chat
            .complete(&[ChatMessage::user(prompt)], &self.options)
            .await?;

        let evaluations = parse_evaluations(&response).inspect_err(|parse_error| {
            error!(error = %parse_error, response = %response, "evaluation response unparsable");
        })?;
        info!(evaluated = evaluations.len(), "candidate evaluation complete");
        Ok(evaluations)
    }
}

pub fn build_candidate_context(document: &IndexedDocument, record: &CandidateRecord) -> String {
    let field = |value: Option<&str>| {
        value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(NOT_SPECIFIED)
            .to_string()
    };
    format!(
        "Name: {}\nPhone: {}\nLocation: {}\nRésumé:\n{}",
        field(record.fullname.as_deref()),
        field(record.mobile_phone.as_deref()),
        field(record.location_name.as_deref()),
        document.content
    )
}

/// Accepts the whole answer or its first code fence, holding an array, a `candidates`
/// array, or an object whose first array-valued field is the list. Model order is kept.
pub fn parse_evaluations(response: &str) -> Result<Vec<CandidateEvaluation>, SearchError> {
    let trimmed = response.trim();
    let attempts = [Some(trimmed), fenced_body(trimmed)];

    let mut items = None;
    for value in attempts
        .into_iter()
        .flatten()
        .filter_map(|text| serde_json::from_str::<Value>(text).ok())
    {
        items = candidate_list(value)?;
        if items.is_some() {
            break;
        }
    }
    let items = items.ok_or_else(|| {
        SearchError::EvaluationParse("no candidate list found in model output".to_string())
    })?;

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            let evaluation: CandidateEvaluation = serde_json::from_value(item).map_err(|error| {
                SearchError::EvaluationParse(format!("entry {position}: {error}"))
            })?;
            evaluation
                .validate()
                .map_err(|details| SearchError::EvaluationParse(format!("entry {position}: {details}")))?;
            Ok(evaluation)
        })
        .collect()
}

fn candidate_list(value: Value) -> Result<Option<Vec<Value>>, SearchError> {
    match value {
        Value::Array(items) => Ok(Some(items)),
        Value::Object(fields) => match fields.get("candidates") {
            Some(Value::Array(items)) => Ok(Some(items.clone())),
            Some(other) => Err(SearchError::EvaluationParse(format!(
                "`candidates` is not a list: {other}"
            ))),
            None => Ok(fields.values().find_map(|value| value.as_array().cloned())),
        },
        _ => Ok(None),
    }
}
