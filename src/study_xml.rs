use quick_xml::escape::escape;
use tracing::info;

use crate::domain::{EnaRecord, Library, StudyRecord};
use crate::error::UploaderError;
use crate::http::Transport;
use crate::layout::{UploadDir, write_file_atomic};
use crate::query::EnaClient;

#[derive(Debug, Clone)]
pub struct StudyXmlOptions {
    pub study: String,
    pub center_name: String,
    pub library: Library,
    pub tpa: bool,
    pub private: bool,
}

/// Registration and submission XML for an assembly study derived from a
/// raw-reads study.
#[derive(Debug, Clone)]
pub struct StudyXmlGenerator {
    options: StudyXmlOptions,
    upload_dir: UploadDir,
    source: StudyRecord,
    title: String,
}

impl StudyXmlGenerator {
    /// Looks the source study up once; the generated documents reuse it.
    pub fn new<T: Transport>(
        client: &EnaClient<T>,
        options: StudyXmlOptions,
        upload_dir: UploadDir,
    ) -> Result<Self, UploaderError> {
        let source = match client.build_query(&options.study, options.private)? {
            EnaRecord::Study(study) => study,
            EnaRecord::Run(run) => {
                return Err(UploaderError::InvalidAccession(run.run_accession));
            }
        };
        Ok(Self::from_record(options, upload_dir, source))
    }

    pub fn from_record(options: StudyXmlOptions, upload_dir: UploadDir, source: StudyRecord) -> Self {
        let title = assembly_title(options.library, options.tpa, &source);
        Self {
            options,
            upload_dir,
            source,
            title,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn upload_dir(&self) -> &UploadDir {
        &self.upload_dir
    }

    pub fn study_xml(&self) -> String {
        let library = self.options.library.to_string().to_lowercase();
        let alias = format!("{}_assembly", self.options.study);
        let description = format!(
            "The {library} assembly was derived from the primary data set {}",
            self.source.study_accession
        );
        let study_type = match self.options.library {
            Library::Metagenome => "Metagenomic assembly",
            Library::Metatranscriptome => "Metatranscriptomic assembly",
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<PROJECT_SET>
    <PROJECT alias="{alias}" center_name="{center}">
        <TITLE>{title}</TITLE>
        <DESCRIPTION>{description}</DESCRIPTION>
        <SUBMISSION_PROJECT>
            <SEQUENCING_PROJECT/>
        </SUBMISSION_PROJECT>
        <RELATED_PROJECTS>
            <RELATED_PROJECT>
                <PARENT_PROJECT accession="{parent}"/>
            </RELATED_PROJECT>
        </RELATED_PROJECTS>
        <PROJECT_ATTRIBUTES>
            <PROJECT_ATTRIBUTE>
                <TAG>new_study_type</TAG>
                <VALUE>{study_type}</VALUE>
            </PROJECT_ATTRIBUTE>
        </PROJECT_ATTRIBUTES>
    </PROJECT>
</PROJECT_SET>
"#,
            alias = escape(&alias),
            center = escape(&self.options.center_name),
            title = escape(&self.title),
            description = escape(&description),
            parent = escape(&self.source.study_accession),
        )
    }

    /// Private source studies keep their hold date on the new study.
    pub fn submission_xml(&self) -> String {
        let hold = if self.options.private {
            format!(
                "\n        <ACTION>\n            <HOLD HoldUntilDate=\"{}\"/>\n        </ACTION>",
                escape(&self.source.first_public)
            )
        } else {
            String::new()
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<SUBMISSION>
    <ACTIONS>
        <ACTION>
            <ADD/>
        </ACTION>{hold}
    </ACTIONS>
</SUBMISSION>
"#
        )
    }

    pub fn write_study_xml(&self) -> Result<(), UploaderError> {
        let path = self.upload_dir.study_xml_path();
        write_file_atomic(&path, self.study_xml().as_bytes())?;
        info!(study = %self.options.study, path = %path, "wrote study registration XML");
        Ok(())
    }

    pub fn write_submission_xml(&self) -> Result<(), UploaderError> {
        let path = self.upload_dir.submission_xml_path();
        write_file_atomic(&path, self.submission_xml().as_bytes())?;
        info!(study = %self.options.study, path = %path, "wrote submission XML");
        Ok(())
    }
}

fn assembly_title(library: Library, tpa: bool, source: &StudyRecord) -> String {
    if tpa {
        format!(
            "{library} assembly of {} data set ({})",
            source.study_accession, source.study_title
        )
    } else {
        format!("{library} assembly of {}", source.study_title)
    }
}
