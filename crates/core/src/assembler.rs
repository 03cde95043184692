use crate::error::{IngestError, Result};
use crate::models::IndexedDocument;
use serde_json::Value;
use tracing::{error, info, warn};

pub fn assemble_documents(entries: Vec<Value>) -> Result<Vec<IndexedDocument>> {
    let total = entries.len();
    let mut documents = Vec::with_capacity(total);

    for (position, entry) in entries.into_iter().enumerate() {
        let Value::Object(mut fields) = entry else {
            error!(position, "entry is not a JSON object, skipping");
            continue;
        };
        if fields.is_empty() {
            warn!(position, "empty entry, skipping");
            continue;
        }

        let content = match fields.remove("embedding_text") {
            Some(Value::String(text)) => text,
            Some(_) => {
                error!(position, "embedding_text is not a string, skipping");
                continue;
            }
            None => {
                error!(position, "entry has no embedding_text, skipping");
                continue;
            }
        };

        let Some(candidate_id) = fields.get("candidate_id").and_then(Value::as_i64) else {
            error!(position, "entry has no integer candidate_id, skipping");
            continue;
        };

        documents.push(IndexedDocument {
            candidate_id,
            content,
            metadata: fields,
        });
    }

    if documents.is_empty() {
        return Err(IngestError::NoValidDocuments);
    }

    info!(documents = documents.len(), entries = total, "assembled index documents");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_valid_entries_and_moves_embedding_text_into_content() {
        let entries = vec![
            json!({"candidate_id": 1, "grade": "Senior", "experience_years": 4.0, "embedding_text": "Rust developer"}),
            json!({}),
            json!("not an object"),
            json!({"candidate_id": 2, "grade": "Junior"}),
            json!({"candidate_id": 3, "embedding_text": 17}),
            json!({"candidate_id": 4, "embedding_text": "Go developer"}),
        ];

        let documents = assemble_documents(entries).unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].candidate_id, 1);
        assert_eq!(documents[0].content, "Rust developer");
        assert!(!documents[0].metadata.contains_key("embedding_text"));
        assert_eq!(documents[0].grade(), Some("Senior"));
        assert_eq!(documents[0].experience_years(), Some(4.0));
        assert_eq!(documents[1].candidate_id, 4);
    }

    #[test]
    fn entries_without_candidate_id_are_skipped() {
        let entries = vec![
            json!({"embedding_text": "orphan"}),
            json!({"candidate_id": "7", "embedding_text": "string id"}),
            json!({"candidate_id": 8, "embedding_text": "kept"}),
        ];

        let documents = assemble_documents(entries).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].candidate_id, 8);
    }

    #[test]
    fn all_invalid_entries_is_an_error() {
        let entries = vec![json!({}), json!(null), json!({"candidate_id": 1})];

        let error = assemble_documents(entries).unwrap_err();

        assert!(matches!(error, IngestError::NoValidDocuments));
        assert_eq!(error.to_string(), "no valid documents to index");
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            assemble_documents(Vec::new()),
            Err(IngestError::NoValidDocuments)
        ));
    }
}
