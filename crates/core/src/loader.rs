use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::models::CandidateRecord;
use crate::parser::is_resume_markup;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const ATTACHMENT_COLUMN: &str = "data";

pub fn discover_export_files(config: &IngestConfig) -> Vec<PathBuf> {
    let present: HashMap<String, PathBuf> = WalkDir::new(&config.data_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            Some((name, entry.into_path()))
        })
        .collect();

    let mut files = Vec::new();
    for number in 1..=config.max_files {
        let name = config.file_pattern.replace("{}", &number.to_string());
        match present.get(&name) {
            Some(path) => files.push(path.clone()),
            None => debug!(file = %name, "export file not found, skipping"),
        }
    }
    files
}

pub fn decode_markup(blob: &str) -> Option<String> {
    let bytes = match STANDARD.decode(blob.trim()) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(error = %error, "attachment is not valid base64");
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim();
    is_resume_markup(text).then(|| text.to_string())
}

async fn read_export_file(path: &Path) -> Result<Vec<CandidateRecord>> {
    let contents = tokio::fs::read(path).await?;
    let file = path.display().to_string();
    let decode_error = |line: u64, error: csv::Error| IngestError::Decode {
        file: file.clone(),
        line: usize::try_from(line).unwrap_or(usize::MAX),
        details: error.to_string(),
    };

    let mut reader = csv::Reader::from_reader(contents.as_slice());
    let headers = reader
        .headers()
        .map_err(|error| decode_error(1, error))?
        .clone();
    let attachment = headers
        .iter()
        .position(|column| column.trim() == ATTACHMENT_COLUMN);
    if attachment.is_none() {
        warn!(file = %file, "export file has no attachment column");
    }

    let mut records = Vec::new();
    let mut row = csv::StringRecord::new();
    loop {
        let line = reader.position().line();
        match reader.read_record(&mut row) {
            Ok(true) => {}
            Ok(false) => break,
            Err(error) => return Err(decode_error(line, error)),
        }

        let mut record: CandidateRecord = row
            .deserialize(Some(&headers))
            .map_err(|error| decode_error(line, error))?;
        record.html = attachment
            .and_then(|column| row.get(column))
            .filter(|blob| !blob.trim().is_empty())
            .and_then(decode_markup);
        records.push(record);
    }

    Ok(records)
}

fn keep_last_by_id(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    let mut seen = HashSet::new();
    let mut kept: Vec<CandidateRecord> = records
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.id))
        .collect();
    kept.reverse();
    kept
}

pub async fn load_export_records(config: &IngestConfig) -> Result<Vec<CandidateRecord>> {
    let files = discover_export_files(config);
    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no export files matching {} found in {}",
            config.file_pattern,
            config.data_dir.display()
        )));
    }

    let mut records = Vec::new();
    for path in &files {
        info!(file = %path.display(), "loading export file");
        records.extend(read_export_file(path).await?);
    }
    info!(rows = records.len(), files = files.len(), "loaded export rows");

    records.retain(|record| record.html.is_some());
    info!(rows = records.len(), "rows with résumé markup");

    let records = keep_last_by_id(records);
    info!(rows = records.len(), "rows after removing duplicates");
    Ok(records)
}
