use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use ena_assembly_uploader::config::{ConfigLoader, ResolvedConfig, credentials_from_env};
use ena_assembly_uploader::domain::Library;
use ena_assembly_uploader::error::UploaderError;
use ena_assembly_uploader::http::ReqwestTransport;
use ena_assembly_uploader::layout::UploadDir;
use ena_assembly_uploader::manifest::{ManifestGenerator, ManifestOptions, read_assemblies};
use ena_assembly_uploader::output::JsonOutput;
use ena_assembly_uploader::query::EnaClient;
use ena_assembly_uploader::study_xml::{StudyXmlGenerator, StudyXmlOptions};
use ena_assembly_uploader::submission::Dropbox;

#[derive(Parser)]
#[command(name = "ena-uploader")]
#[command(about = "Register assembly studies and generate assembly manifests for ENA")]
#[command(version, author)]
struct Cli {
    /// JSON config with endpoint and retry overrides
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Look up a study or run and print its metadata as JSON")]
    Query(QueryArgs),
    #[command(about = "Generate study registration and submission XMLs")]
    StudyXml(StudyXmlArgs),
    #[command(about = "Register a study through the ENA dropbox")]
    SubmitStudy(SubmitStudyArgs),
    #[command(about = "Release a private study")]
    ReleaseStudy(ReleaseStudyArgs),
    #[command(about = "Write assembly manifests from a CSV of assemblies")]
    Manifest(ManifestArgs),
}

#[derive(Args)]
struct QueryArgs {
    accession: String,

    /// Use the Webin reports API instead of the public portal
    #[arg(long)]
    private: bool,
}

#[derive(Args)]
struct StudyXmlArgs {
    /// Raw-reads study accession
    #[arg(long)]
    study: String,

    #[arg(long, value_enum, default_value = "metagenome")]
    library: Library,

    #[arg(long, default_value = "EMG")]
    center: String,

    /// Third party assembly of another submitter's reads
    #[arg(long)]
    tpa: bool,

    #[arg(long)]
    private: bool,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct SubmitStudyArgs {
    /// Raw-reads study accession
    #[arg(long)]
    study: String,

    /// Directory containing the study XMLs (default: ./<study>_upload)
    #[arg(long)]
    directory: Option<Utf8PathBuf>,

    /// Submit to the ENA test server
    #[arg(long)]
    test: bool,
}

#[derive(Args)]
struct ReleaseStudyArgs {
    #[arg(long)]
    study: String,

    #[arg(long)]
    test: bool,
}

#[derive(Args)]
struct ManifestArgs {
    /// Raw-reads study accession
    #[arg(long)]
    study: String,

    /// CSV with Run, Coverage, Assembler, Version, Filepath columns
    #[arg(long)]
    data: Utf8PathBuf,

    /// Study the assemblies are registered under
    #[arg(long)]
    assembly_study: String,

    /// Overwrite existing manifests
    #[arg(long)]
    force: bool,

    #[arg(long)]
    tpa: bool,

    #[arg(long)]
    private: bool,

    #[arg(long)]
    output_dir: Option<Utf8PathBuf>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<UploaderError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UploaderError) -> u8 {
    match error {
        UploaderError::InvalidAccession(_)
        | UploaderError::MissingCredentials
        | UploaderError::NoDataFound { .. }
        | UploaderError::RunNotFound { .. } => 2,
        UploaderError::NotFoundOrUnreachable { .. }
        | UploaderError::HttpStatus { .. }
        | UploaderError::Transport(_)
        | UploaderError::SubmissionServerError { .. }
        | UploaderError::SubmissionFailed { .. }
        | UploaderError::StudyRelease { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Query(args) => {
            let client = lookup_client(&config, args.private)?;
            let record = client.build_query(&args.accession, args.private)?;
            JsonOutput::print_record(&record).into_diagnostic()?;
            Ok(())
        }
        Commands::StudyXml(args) => {
            let client = lookup_client(&config, args.private)?;
            let upload_dir = upload_dir(args.output_dir, &args.study)?;
            upload_dir.ensure()?;
            let generator = StudyXmlGenerator::new(
                &client,
                StudyXmlOptions {
                    study: args.study,
                    center_name: args.center,
                    library: args.library,
                    tpa: args.tpa,
                    private: args.private,
                },
                upload_dir,
            )?;
            generator.write_study_xml()?;
            generator.write_submission_xml()?;
            Ok(())
        }
        Commands::SubmitStudy(args) => {
            let credentials = credentials_from_env()?;
            let transport = ReqwestTransport::new(config.timeout)?;
            let upload_dir = match args.directory {
                Some(directory) => UploadDir::existing(&directory, &args.study),
                None => UploadDir::in_current_dir(&args.study)?,
            };
            let dropbox = Dropbox::new(
                &transport,
                config.endpoints.dropbox_for(args.test),
                &credentials,
            );
            let registered = dropbox.submit_study(&upload_dir)?;
            JsonOutput::print_registered(&registered).into_diagnostic()?;
            Ok(())
        }
        Commands::ReleaseStudy(args) => {
            let credentials = credentials_from_env()?;
            let transport = ReqwestTransport::new(config.timeout)?;
            let upload_dir = UploadDir::in_current_dir(&args.study)?;
            let dropbox = Dropbox::new(
                &transport,
                config.endpoints.dropbox_for(args.test),
                &credentials,
            );
            dropbox.release_study(&args.study, &upload_dir.release_xml_path())?;
            Ok(())
        }
        Commands::Manifest(args) => {
            let client = lookup_client(&config, args.private)?;
            let rows = read_assemblies(&args.data)?;
            let generator = ManifestGenerator::new(
                &client,
                upload_dir(args.output_dir, &args.study)?,
                ManifestOptions {
                    assembly_study: args.assembly_study,
                    tpa: args.tpa,
                    force: args.force,
                    private: args.private,
                },
            );
            let summary = generator.write_manifests(&rows)?;
            JsonOutput::print_manifests(&summary).into_diagnostic()?;
            Ok(())
        }
    }
}

/// Credentials are only demanded for private lookups.
fn lookup_client(
    config: &ResolvedConfig,
    private: bool,
) -> Result<EnaClient<ReqwestTransport>, UploaderError> {
    let credentials = if private {
        Some(credentials_from_env()?)
    } else {
        None
    };
    Ok(EnaClient::new(
        ReqwestTransport::new(config.timeout)?,
        config.endpoints.clone(),
        config.retry.clone(),
        credentials,
    ))
}

fn upload_dir(output_dir: Option<Utf8PathBuf>, study: &str) -> Result<UploadDir, UploaderError> {
    match output_dir {
        Some(dir) => Ok(UploadDir::new(&dir, study)),
        None => UploadDir::in_current_dir(study),
    }
}
