use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UploaderError {
    #[error("{0} is not a valid accession")]
    #[diagnostic(help("expected a PRJ*/SRP/ERP/DRP study or an SRR/ERR/DRR run accession"))]
    InvalidAccession(String),

    #[error("ENA_WEBIN and ENA_WEBIN_PASSWORD are not set")]
    MissingCredentials,

    #[error("Could not find {accession} in ENA after {attempts} attempts.")]
    NotFoundOrUnreachable { accession: String, attempts: u32 },

    #[error("ENA returned status {status} for {accession}: {message}")]
    HttpStatus {
        accession: String,
        status: u16,
        message: String,
    },

    #[error("Could not find run {accession} in ENA after {attempts} attempts")]
    RunNotFound { accession: String, attempts: u32 },

    #[error("no data found for {accession} in ENA: {detail}")]
    NoDataFound { accession: String, detail: String },

    #[error("failed to parse study XML for {accession}: {message}")]
    XmlParse { accession: String, message: String },

    #[error("receipt reports success but carries no project accession: {0}")]
    MalformedSuccessReceipt(String),

    #[error("receipt reports an existing object but carries no project accession: {0}")]
    MalformedConflictReceipt(String),

    #[error("{target} could not be registered on ENA as the server does not respond")]
    #[diagnostic(help("please try again later"))]
    SubmissionServerError { target: String },

    #[error("{target} could not be registered on ENA. HTTP response: {receipt}")]
    SubmissionFailed { target: String, receipt: String },

    #[error("failed to release study {accession}: {receipt}")]
    StudyRelease { accession: String, receipt: String },

    #[error("ENA request failed: {0}")]
    Transport(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read assemblies CSV: {0}")]
    Csv(String),

    #[error("invalid assembly file for run {run}: {reason}")]
    InvalidAssembly { run: String, reason: String },
}

impl UploaderError {
    /// Lookup failures a batch caller may log and step over.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            UploaderError::NoDataFound { .. } | UploaderError::RunNotFound { .. }
        )
    }
}
