use crate::error::{ExtractionError, LlmError};
use crate::llm::{fenced_body, ChatMessage, ChatOptions};
use crate::models::{CandidateMetadata, CandidateRecord};
use crate::prompts;
use crate::traits::ChatModel;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionState {
    Pending,
    Parsed,
    RepairAttempted,
    Success,
    Failed,
}

#[derive(Debug)]
pub struct Extraction {
    pub states: Vec<ExtractionState>,
    pub model_calls: usize,
    pub result: Result<CandidateMetadata, ExtractionError>,
}

impl Extraction {
    pub fn state(&self) -> ExtractionState {
        self.states
            .last()
            .copied()
            .unwrap_or(ExtractionState::Pending)
    }
}

struct Trace {
    states: Vec<ExtractionState>,
    model_calls: usize,
}

impl Trace {
    fn new() -> Self {
        Self {
            states: vec![ExtractionState::Pending],
            model_calls: 0,
        }
    }

    fn enter(&mut self, state: ExtractionState) {
        self.states.push(state);
    }

    fn succeed(mut self, metadata: CandidateMetadata) -> Extraction {
        self.enter(ExtractionState::Success);
        Extraction {
            states: self.states,
            model_calls: self.model_calls,
            result: Ok(metadata),
        }
    }

    fn fail(mut self, error: ExtractionError) -> Extraction {
        self.enter(ExtractionState::Failed);
        Extraction {
            states: self.states,
            model_calls: self.model_calls,
            result: Err(error),
        }
    }
}

#[derive(Clone)]
pub struct MetadataExtractor {
    chat: Arc<dyn ChatModel>,
    options: ChatOptions,
}

impl MetadataExtractor {
    pub fn new(chat: Arc<dyn ChatModel>, options: ChatOptions) -> Self {
        Self { chat, options }
    }

    pub async fn extract(&self, resume_text: &str) -> Extraction {
        let mut trace = Trace::new();

        let extraction_messages = [
            ChatMessage::system(format!(
                "{}\n{}",
                prompts::EXTRACTION_SYSTEM,
                prompts::METADATA_SCHEMA
            )),
            ChatMessage::user(prompts::extraction_user(resume_text)),
        ];
        let first_answer = match self.call(&mut trace, &extraction_messages).await {
            Ok(answer) => answer,
            Err(error) => return trace.fail(error.into()),
        };

        match parse_metadata(&first_answer) {
            Ok(metadata) => {
                trace.enter(ExtractionState::Parsed);
                return trace.succeed(metadata);
            }
            Err(details) => {
                warn!(error = %details, "extraction output failed validation, requesting repair");
            }
        }

        trace.enter(ExtractionState::RepairAttempted);
        let repair_messages = [
            ChatMessage::system(format!(
                "{}\n{}",
                prompts::REPAIR_SYSTEM,
                prompts::METADATA_SCHEMA
            )),
            ChatMessage::user(prompts::repair_user(&first_answer)),
        ];
        let repaired = match self.call(&mut trace, &repair_messages).await {
            Ok(answer) => answer,
            Err(error) => return trace.fail(error.into()),
        };

        match parse_metadata(&repaired) {
            Ok(metadata) => trace.succeed(metadata),
            Err(details) => {
                error!(error = %details, output = %repaired, "repaired output still invalid");
                trace.fail(ExtractionError::SchemaValidation { details })
            }
        }
    }

    async fn call(&self, trace: &mut Trace, messages: &[ChatMessage]) -> Result<String, LlmError> {
        trace.model_calls += 1;
        self.chat.complete(messages, &self.options).await
    }
}

pub fn parse_metadata(raw: &str) -> Result<CandidateMetadata, String> {
    let body = fenced_body(raw).unwrap_or_else(|| raw.trim());
    let metadata: CandidateMetadata =
        serde_json::from_str(body).map_err(|error| error.to_string())?;
    metadata.validate()?;
    Ok(metadata)
}

/// Pins the metadata to the record it was extracted from and strips the record's
/// contact details out of `embedding_text`.
pub fn bind_to_record(
    mut metadata: CandidateMetadata,
    record: &CandidateRecord,
) -> Result<CandidateMetadata, ExtractionError> {
    if metadata.candidate_id != record.id {
        warn!(
            candidate_id = record.id,
            extracted_id = metadata.candidate_id,
            "model returned a different candidate id, using the record id"
        );
        metadata.candidate_id = record.id;
    }

    let personal = [
        record.fullname.as_deref(),
        record.mobile_phone.as_deref(),
        record.email.as_deref(),
    ];
    let personal: Vec<String> = personal
        .into_iter()
        .flatten()
        .map(collapse_whitespace)
        .filter(|value| !value.is_empty())
        .collect();

    // Removing one occurrence can join its neighbours into a new one, so repeat until none remain.
    let mut text = collapse_whitespace(&metadata.embedding_text);
    while let Some(value) = personal.iter().find(|value| text.contains(value.as_str())) {
        text = collapse_whitespace(&text.replace(value.as_str(), " "));
    }
    metadata.embedding_text = text;

    metadata
        .validate()
        .map_err(|details| ExtractionError::SchemaValidation { details })?;
    Ok(metadata)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
