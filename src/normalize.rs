use quick_xml::Reader;
use quick_xml::events::Event;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{RunRecord, StudyRecord};
use crate::error::UploaderError;

/// Bodies for a study lookup, by source.
#[derive(Debug, Clone)]
pub enum StudyPayload<'a> {
    /// JSON array from the portal search API.
    Public(&'a str),
    /// Text fields already read from the XML study document, plus the JSON
    /// report from the Webin reports API.
    Private { text: StudyText, report: &'a str },
}

#[derive(Debug, Clone, Copy)]
pub enum RunPayload<'a> {
    Public(&'a str),
    Private(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyText {
    pub title: String,
    pub description: Option<String>,
}

/// The reports API has no single study document, so a private study joins
/// the XML text fields with the JSON release date.
pub fn normalize_study(
    accession: &str,
    payload: StudyPayload<'_>,
) -> Result<StudyRecord, UploaderError> {
    match payload {
        StudyPayload::Public(body) => record_from_first(accession, body),
        StudyPayload::Private { text, report } => Ok(StudyRecord {
            study_accession: accession.to_string(),
            study_title: text.title,
            study_description: text.description,
            first_public: first_public_from_report(accession, report)?,
        }),
    }
}

pub fn normalize_run(accession: &str, payload: RunPayload<'_>) -> Result<RunRecord, UploaderError> {
    match payload {
        RunPayload::Public(body) => record_from_first(accession, body),
        RunPayload::Private(body) => {
            let report = report_object(accession, body)?;
            Ok(RunRecord {
                run_accession: accession.to_string(),
                sample_accession: report_str(accession, &report, "sampleId")?,
                instrument_model: report_str(accession, &report, "instrumentModel")?,
            })
        }
    }
}

/// Element 0 of a JSON array body.
pub fn first_element(accession: &str, body: &str) -> Result<Value, UploaderError> {
    let value: Value = serde_json::from_str(body).map_err(|err| UploaderError::NoDataFound {
        accession: accession.to_string(),
        detail: format!("response is not JSON ({err}): {body}"),
    })?;
    match value {
        Value::Array(mut items) if !items.is_empty() => Ok(items.swap_remove(0)),
        Value::Array(_) => Err(UploaderError::NoDataFound {
            accession: accession.to_string(),
            detail: "empty result".to_string(),
        }),
        other => Err(UploaderError::NoDataFound {
            accession: accession.to_string(),
            detail: format!("expected a JSON array, got: {other}"),
        }),
    }
}

fn record_from_first<T: DeserializeOwned>(accession: &str, body: &str) -> Result<T, UploaderError> {
    let first = first_element(accession, body)?;
    serde_json::from_value(first).map_err(|err| UploaderError::NoDataFound {
        accession: accession.to_string(),
        detail: format!("unexpected record shape: {err}"),
    })
}

fn report_object(accession: &str, body: &str) -> Result<Value, UploaderError> {
    let mut first = first_element(accession, body)?;
    match first.get_mut("report").map(Value::take) {
        Some(report @ Value::Object(_)) => Ok(report),
        _ => Err(UploaderError::NoDataFound {
            accession: accession.to_string(),
            detail: "report object missing".to_string(),
        }),
    }
}

fn report_str(accession: &str, report: &Value, field: &str) -> Result<String, UploaderError> {
    report
        .get(field)
        .and_then(|value| value.as_str())
        .map(|value| value.to_string())
        .ok_or_else(|| UploaderError::NoDataFound {
            accession: accession.to_string(),
            detail: format!("report field {field} missing"),
        })
}

/// `report.firstPublic` with the time component dropped.
pub fn first_public_from_report(accession: &str, body: &str) -> Result<String, UploaderError> {
    let report = report_object(accession, body)?;
    let timestamp = report_str(accession, &report, "firstPublic")?;
    Ok(date_only(&timestamp).to_string())
}

pub fn date_only(timestamp: &str) -> &str {
    timestamp
        .split_once('T')
        .map(|(date, _)| date)
        .unwrap_or(timestamp)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StudyTag {
    Title,
    Description,
}

/// First text of the first `STUDY_TITLE` and `STUDY_DESCRIPTION` elements.
/// The title is required.
pub fn parse_study_xml(accession: &str, xml: &str) -> Result<StudyText, UploaderError> {
    let xml_error = |message: String| UploaderError::XmlParse {
        accession: accession.to_string(),
        message,
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current: Option<StudyTag> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;

    loop {
        let text = match reader.read_event() {
            Ok(Event::Start(e)) => {
                current = match e.name().as_ref() {
                    b"STUDY_TITLE" => Some(StudyTag::Title),
                    b"STUDY_DESCRIPTION" => Some(StudyTag::Description),
                    _ => None,
                };
                None
            }
            Ok(Event::Text(e)) => Some(
                e.unescape()
                    .map_err(|err| xml_error(err.to_string()))?
                    .into_owned(),
            ),
            Ok(Event::CData(e)) => Some(String::from_utf8_lossy(&e.into_inner()).into_owned()),
            Ok(Event::End(_)) => {
                current = None;
                None
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(xml_error(format!(
                    "error at position {}: {err}",
                    reader.error_position()
                )));
            }
            Ok(_) => None,
        };

        if let (Some(tag), Some(text)) = (current, text) {
            let slot = match tag {
                StudyTag::Title => &mut title,
                StudyTag::Description => &mut description,
            };
            if slot.is_none() {
                *slot = Some(text);
            }
        }
    }

    let title = title.ok_or_else(|| xml_error("STUDY_TITLE element not found".to_string()))?;
    Ok(StudyText { title, description })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_only_strips_time() {
        assert_eq!(date_only("2022-08-02T17:21:21"), "2022-08-02");
        assert_eq!(date_only("2022-08-02"), "2022-08-02");
    }

    #[test]
    fn xml_entities_unescaped() {
        let xml = "<STUDY><DESCRIPTOR><STUDY_TITLE>A &amp; B</STUDY_TITLE></DESCRIPTOR></STUDY>";
        let text = parse_study_xml("ERP1", xml).unwrap();
        assert_eq!(text.title, "A & B");
        assert_eq!(text.description, None);
    }

    #[test]
    fn private_study_from_xml_and_report() {
        let xml = r#"<STUDY_SET>
            <STUDY accession="ERP125469">
                <DESCRIPTOR>
                    <STUDY_TITLE>HoloFood Salmon Trial A+B Gut Metagenome</STUDY_TITLE>
                    <STUDY_DESCRIPTION>Metagenomic raw reads from HoloFood salmon gut samples.</STUDY_DESCRIPTION>
                </DESCRIPTOR>
            </STUDY>
        </STUDY_SET>"#;
        let report = r#"[{"report": {"id": "ERP125469", "firstPublic": "2022-08-02T17:21:21"}}]"#;

        let text = parse_study_xml("ERP125469", xml).unwrap();
        let study =
            normalize_study("ERP125469", StudyPayload::Private { text, report }).unwrap();
        assert_eq!(
            study,
            StudyRecord {
                study_accession: "ERP125469".to_string(),
                study_title: "HoloFood Salmon Trial A+B Gut Metagenome".to_string(),
                study_description: Some(
                    "Metagenomic raw reads from HoloFood salmon gut samples.".to_string()
                ),
                first_public: "2022-08-02".to_string(),
            }
        );
    }

    #[test]
    fn private_study_without_first_public_is_no_data() {
        let text = StudyText {
            title: "Gut".to_string(),
            description: None,
        };
        let report = r#"[{"report": {"id": "ERP125469"}}]"#;
        let err = normalize_study("ERP125469", StudyPayload::Private { text, report }).unwrap_err();
        assert!(matches!(err, UploaderError::NoDataFound { .. }));
    }

    #[test]
    fn non_array_payload_is_no_data() {
        let err = first_element("ERR1", r#"{"message": "oops"}"#).unwrap_err();
        assert!(matches!(err, UploaderError::NoDataFound { .. }));
    }
}
