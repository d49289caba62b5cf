use std::fs;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{error, info};

use crate::domain::WebinCredentials;
use crate::error::UploaderError;
use crate::http::{FormPart, HttpRequest, HttpResponse, Transport};
use crate::layout::{UploadDir, write_file_atomic};
use crate::receipt::{SubmissionReceipt, parse_receipt, receipt_reports_success};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredStudy {
    pub accession: String,
    /// False when the dropbox reported the study as already registered.
    pub created: bool,
}

/// Posts documents to one dropbox URL with one Webin account. Submissions
/// are sent once and never resubmitted automatically.
pub struct Dropbox<'a, T: Transport> {
    transport: &'a T,
    url: &'a str,
    credentials: &'a WebinCredentials,
}

impl<'a, T: Transport> Dropbox<'a, T> {
    pub fn new(transport: &'a T, url: &'a str, credentials: &'a WebinCredentials) -> Self {
        Self {
            transport,
            url,
            credentials,
        }
    }

    /// Registers the study XML found in `upload_dir` with `ACTION=ADD`.
    pub fn submit_study(&self, upload_dir: &UploadDir) -> Result<RegisteredStudy, UploaderError> {
        let study = upload_dir.study();
        info!(study, "submitting study xml");
        let submission = read_part("SUBMISSION", &upload_dir.submission_xml_path())?;
        let project = read_part("PROJECT", &upload_dir.study_xml_path())?;
        let response = self.post(vec![submission, FormPart::text("ACTION", "ADD"), project])?;

        match parse_receipt(&response.body, response.status)? {
            SubmissionReceipt::Success(accession) => {
                info!(
                    study,
                    accession = %accession,
                    "A new study accession has been created: {accession}. Make a note of this!"
                );
                Ok(RegisteredStudy {
                    accession,
                    created: true,
                })
            }
            SubmissionReceipt::Conflict(accession) => {
                info!(
                    study,
                    accession = %accession,
                    "An accession with this alias already exists in project {accession}"
                );
                Ok(RegisteredStudy {
                    accession,
                    created: false,
                })
            }
            SubmissionReceipt::ServerError => {
                error!(study, status = response.status, "dropbox did not respond");
                Err(UploaderError::SubmissionServerError {
                    target: study.to_string(),
                })
            }
            SubmissionReceipt::OtherFailure(receipt) => {
                error!(study, status = response.status, "study registration failed");
                Err(UploaderError::SubmissionFailed {
                    target: study.to_string(),
                    receipt,
                })
            }
        }
    }

    /// Writes a RELEASE submission for `accession` to `xml_path` and posts it.
    pub fn release_study(&self, accession: &str, xml_path: &Utf8Path) -> Result<(), UploaderError> {
        write_file_atomic(xml_path, release_xml(accession).as_bytes())?;
        let submission = read_part("SUBMISSION", xml_path)?;
        let response = self.post(vec![submission])?;

        if receipt_reports_success(&response.body) {
            info!(accession, "study released");
            return Ok(());
        }
        error!(accession, status = response.status, "study release failed");
        Err(UploaderError::StudyRelease {
            accession: accession.to_string(),
            receipt: response.body,
        })
    }

    fn post(&self, parts: Vec<FormPart>) -> Result<HttpResponse, UploaderError> {
        let request = HttpRequest::post_multipart(self.url, self.credentials, parts);
        self.transport
            .send(&request)
            .map_err(|err| UploaderError::Transport(err.to_string()))
    }
}

pub fn release_xml(accession: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SUBMISSION>
    <ACTIONS>
        <ACTION>
            <RELEASE target="{}"/>
        </ACTION>
    </ACTIONS>
</SUBMISSION>
"#,
        quick_xml::escape::escape(accession)
    )
}

fn read_part(name: &str, path: &Utf8Path) -> Result<FormPart, UploaderError> {
    let bytes = fs::read(path.as_std_path())
        .map_err(|err| UploaderError::Filesystem(format!("read {path}: {err}")))?;
    let file_name = path.file_name().unwrap_or(name);
    Ok(FormPart::file(name, file_name, bytes))
}
