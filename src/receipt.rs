//! Classification of dropbox receipts.
//!
//! The markers and accession patterns below mirror what the ENA dropbox
//! currently writes into its receipts. They are the only place that knows
//! the receipt format.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;

use crate::error::UploaderError;

const SUCCESS_MARKER: &str = r#"success="true""#;
const EXISTING_OBJECT_MARKER: &str =
    "The object being added already exists in the submission account";

static SUCCESS_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"accession="(PRJ[EDN][A-Z][0-9]+)""#).expect("success accession pattern")
});

static EXISTING_ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"accession: "(PRJ[EDN][A-Z][0-9]+)""#).expect("existing accession pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReceipt {
    Success(String),
    Conflict(String),
    ServerError,
    OtherFailure(String),
}

/// Classifies a receipt. Checks run in order: success marker, existing
/// object marker, server status, anything else.
pub fn parse_receipt(raw: &str, status: u16) -> Result<SubmissionReceipt, UploaderError> {
    if receipt_reports_success(raw) {
        return SUCCESS_ACCESSION
            .captures(raw)
            .map(|caps| SubmissionReceipt::Success(caps[1].to_string()))
            .ok_or_else(|| UploaderError::MalformedSuccessReceipt(raw.to_string()));
    }
    if raw.contains(EXISTING_OBJECT_MARKER) {
        return existing_accession(raw)
            .map(SubmissionReceipt::Conflict)
            .ok_or_else(|| UploaderError::MalformedConflictReceipt(raw.to_string()));
    }
    if status >= 500 {
        return Ok(SubmissionReceipt::ServerError);
    }
    Ok(SubmissionReceipt::OtherFailure(raw.to_string()))
}

pub fn receipt_reports_success(raw: &str) -> bool {
    raw.contains(SUCCESS_MARKER)
}

fn existing_accession(raw: &str) -> Option<String> {
    error_messages(raw).iter().find_map(|message| {
        EXISTING_ACCESSION
            .captures(message)
            .map(|caps| caps[1].to_string())
    })
}

/// Text of every `<ERROR>` element. Reading stops at the first XML error.
fn error_messages(raw: &str) -> Vec<String> {
    let mut reader = Reader::from_str(raw);
    reader.config_mut().trim_text(true);

    let mut messages = Vec::new();
    let mut in_error = false;
    let mut current = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"ERROR" => {
                in_error = true;
                current.clear();
            }
            Ok(Event::Text(e)) if in_error => match e.unescape() {
                Ok(text) => current.push_str(&text),
                Err(_) => current.push_str(&String::from_utf8_lossy(&e)),
            },
            Ok(Event::End(e)) if e.name().as_ref() == b"ERROR" => {
                in_error = false;
                messages.push(std::mem::take(&mut current));
            }
            Ok(Event::Eof) | Err(_) => break,
            Ok(_) => {}
        }
    }
    messages
}
