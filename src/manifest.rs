use std::fs::File;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::{EnaRecord, RunRecord};
use crate::error::UploaderError;
use crate::http::Transport;
use crate::layout::{UploadDir, write_file_atomic};
use crate::query::EnaClient;

const COMPRESSED_FASTA: [&str; 3] = ["fa.gz", "fna.gz", "fasta.gz"];
const ASSEMBLY_TYPE: &str = "primary metagenome";

/// One row of the assemblies CSV.
#[derive(Debug, Clone, Deserialize)]
pub struct AssemblyRow {
    #[serde(rename = "Run")]
    pub run: String,
    #[serde(rename = "Coverage")]
    pub coverage: String,
    #[serde(rename = "Assembler")]
    pub assembler: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Filepath")]
    pub filepath: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Study the assemblies are registered under.
    pub assembly_study: String,
    pub tpa: bool,
    pub force: bool,
    pub private: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestSummary {
    pub written: Vec<String>,
    pub skipped: Vec<SkippedRun>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRun {
    pub run: String,
    pub reason: String,
}

pub fn read_assemblies(path: &Utf8Path) -> Result<Vec<AssemblyRow>, UploaderError> {
    let mut reader = csv::Reader::from_path(path.as_std_path())
        .map_err(|err| UploaderError::Csv(format!("{path}: {err}")))?;
    reader
        .deserialize()
        .collect::<Result<Vec<AssemblyRow>, _>>()
        .map_err(|err| UploaderError::Csv(format!("{path}: {err}")))
}

/// Writes one `<run>.manifest` per assembly row, looking runs up one at a
/// time.
pub struct ManifestGenerator<'a, T: Transport> {
    client: &'a EnaClient<T>,
    upload_dir: UploadDir,
    options: ManifestOptions,
}

impl<'a, T: Transport> ManifestGenerator<'a, T> {
    pub fn new(client: &'a EnaClient<T>, upload_dir: UploadDir, options: ManifestOptions) -> Self {
        Self {
            client,
            upload_dir,
            options,
        }
    }

    /// Rows with a skippable lookup error or a bad assembly file are logged
    /// and reported as skipped. Any other error stops the batch.
    pub fn write_manifests(&self, rows: &[AssemblyRow]) -> Result<ManifestSummary, UploaderError> {
        self.upload_dir.ensure()?;
        let mut summary = ManifestSummary {
            written: Vec::new(),
            skipped: Vec::new(),
        };

        for row in rows {
            match self.write_manifest(row) {
                Ok(true) => summary.written.push(row.run.clone()),
                Ok(false) => summary.skipped.push(SkippedRun {
                    run: row.run.clone(),
                    reason: "manifest already exists".to_string(),
                }),
                Err(err) if err.is_skippable() || is_assembly_error(&err) => {
                    error!(run = %row.run, error = %err, "skipping manifest");
                    summary.skipped.push(SkippedRun {
                        run: row.run.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            "manifest generation completed"
        );
        Ok(summary)
    }

    /// `Ok(false)` when an existing manifest was left in place.
    pub fn write_manifest(&self, row: &AssemblyRow) -> Result<bool, UploaderError> {
        info!(run = %row.run, "writing manifest");
        validate_assembly_path(&row.run, &row.filepath)?;

        let manifest_path = self.upload_dir.manifest_path(&row.run);
        if manifest_path.as_std_path().exists() && !self.options.force {
            warn!(
                run = %row.run,
                path = %manifest_path,
                "manifest already exists, skipping"
            );
            return Ok(false);
        }

        let run = match self.client.build_query(&row.run, self.options.private)? {
            EnaRecord::Run(run) => run,
            EnaRecord::Study(study) => {
                return Err(UploaderError::InvalidAccession(study.study_accession));
            }
        };
        let alias = file_md5(&row.filepath)?;
        let manifest = render_manifest(&self.options, row, &run, &alias);
        write_file_atomic(&manifest_path, manifest.as_bytes())?;
        info!(run = %row.run, path = %manifest_path, "wrote manifest");
        Ok(true)
    }
}

fn is_assembly_error(err: &UploaderError) -> bool {
    matches!(err, UploaderError::InvalidAssembly { .. })
}

pub fn validate_assembly_path(run: &str, path: &Utf8Path) -> Result<(), UploaderError> {
    if !path.as_std_path().exists() {
        return Err(UploaderError::InvalidAssembly {
            run: run.to_string(),
            reason: format!("assembly path {path} does not exist"),
        });
    }
    if !COMPRESSED_FASTA
        .iter()
        .any(|suffix| path.as_str().contains(suffix))
    {
        return Err(UploaderError::InvalidAssembly {
            run: run.to_string(),
            reason: format!("assembly file {path} is either not fasta format or not compressed"),
        });
    }
    Ok(())
}

/// Tab-separated `KEY\tvalue` lines in the order webin-cli documents them.
pub fn render_manifest(
    options: &ManifestOptions,
    row: &AssemblyRow,
    run: &RunRecord,
    assembly_alias: &str,
) -> String {
    let program = format!("{} v{}", row.assembler, row.version);
    let assembly_name = format!("{}_{assembly_alias}", row.run);
    let mut values = vec![
        ("STUDY", options.assembly_study.as_str()),
        ("SAMPLE", run.sample_accession.as_str()),
        ("RUN_REF", row.run.as_str()),
        ("ASSEMBLYNAME", assembly_name.as_str()),
        ("ASSEMBLY_TYPE", ASSEMBLY_TYPE),
        ("COVERAGE", row.coverage.as_str()),
        ("PROGRAM", program.as_str()),
        ("PLATFORM", run.instrument_model.as_str()),
        ("FASTA", row.filepath.as_str()),
    ];
    if options.tpa {
        values.push(("TPA", "true"));
    }
    values
        .into_iter()
        .map(|(key, value)| format!("{key}\t{value}\n"))
        .collect()
}

pub fn file_md5(path: &Utf8Path) -> Result<String, UploaderError> {
    let mut file = File::open(path.as_std_path())
        .map_err(|err| UploaderError::Filesystem(format!("open {path}: {err}")))?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|err| UploaderError::Filesystem(format!("read {path}: {err}")))?;
    Ok(hex::encode(hasher.finalize()))
}
