use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::UploaderError;

/// Which public search field addresses a study accession.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StudyNamespace {
    /// `PRJEB…`, `PRJNA…`, `PRJDB…`
    Project,
    /// `ERP…`, `SRP…`, `DRP…`
    Secondary,
}

impl StudyNamespace {
    pub fn search_field(&self) -> &'static str {
        match self {
            StudyNamespace::Project => "study_accession",
            StudyNamespace::Secondary => "secondary_study_accession",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessionKind {
    Study(StudyNamespace),
    Run,
    Unrecognized,
}

/// Classifies an identifier by prefix and substring. The checks run in a
/// fixed order and the first match wins, so `PRJ` beats `RP` beats `RR`.
pub fn classify(accession: &str) -> AccessionKind {
    if accession.starts_with("PRJ") {
        AccessionKind::Study(StudyNamespace::Project)
    } else if accession.contains("RP") {
        AccessionKind::Study(StudyNamespace::Secondary)
    } else if accession.contains("RR") {
        AccessionKind::Run
    } else {
        AccessionKind::Unrecognized
    }
}

/// A classified archive identifier. Construction rejects unrecognized input,
/// so a held `Accession` is always a study or a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Accession {
    raw: String,
    kind: AccessionKind,
}

impl Accession {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> AccessionKind {
        self.kind
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for Accession {
    type Err = UploaderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match classify(value) {
            AccessionKind::Unrecognized => Err(UploaderError::InvalidAccession(value.to_string())),
            kind => Ok(Self {
                raw: value.to_string(),
                kind,
            }),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct WebinCredentials {
    pub username: String,
    pub password: String,
}

impl WebinCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for WebinCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebinCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessMode {
    Public,
    Private(WebinCredentials),
}

impl AccessMode {
    pub fn label(&self) -> &'static str {
        match self {
            AccessMode::Public => "public",
            AccessMode::Private(_) => "private",
        }
    }

    pub fn credentials(&self) -> Option<&WebinCredentials> {
        match self {
            AccessMode::Public => None,
            AccessMode::Private(credentials) => Some(credentials),
        }
    }
}

/// Everything a single lookup needs. Built once per accession and never
/// mutated.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub accession: Accession,
    pub mode: AccessMode,
}

impl QueryContext {
    /// Validates the accession, then the credentials, before any request
    /// can be issued.
    pub fn new(
        accession: &str,
        private: bool,
        credentials: Option<&WebinCredentials>,
    ) -> Result<Self, UploaderError> {
        let accession: Accession = accession.parse()?;
        let mode = if private {
            let credentials = credentials.ok_or(UploaderError::MissingCredentials)?;
            AccessMode::Private(credentials.clone())
        } else {
            AccessMode::Public
        };
        Ok(Self { accession, mode })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudyRecord {
    pub study_accession: String,
    pub study_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_description: Option<String>,
    pub first_public: String,
}

/// In private mode `sample_accession` holds the primary sample id (`ERS…`)
/// rather than the public BioSample id (`SAMEA…`) for the same run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_accession: String,
    pub sample_accession: String,
    pub instrument_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EnaRecord {
    Study(StudyRecord),
    Run(RunRecord),
}

impl EnaRecord {
    pub fn into_study(self) -> Option<StudyRecord> {
        match self {
            EnaRecord::Study(study) => Some(study),
            EnaRecord::Run(_) => None,
        }
    }

    pub fn into_run(self) -> Option<RunRecord> {
        match self {
            EnaRecord::Run(run) => Some(run),
            EnaRecord::Study(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    Metagenome,
    Metatranscriptome,
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Library::Metagenome => write!(f, "Metagenome"),
            Library::Metatranscriptome => write!(f, "Metatranscriptome"),
        }
    }
}
