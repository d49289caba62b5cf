mod support;

use std::fs;

use camino::Utf8PathBuf;

use ena_assembly_uploader::http::Method;
use ena_assembly_uploader::layout::UploadDir;
use ena_assembly_uploader::manifest::{ManifestGenerator, ManifestOptions, read_assemblies};

use support::{MockTransport, SEARCH_URL, public_client};

const PUBLIC_RUN: &str = r#"[{"run_accession":"ERR4918394","sample_accession":"SAMEA7687881","instrument_model":"DNBSEQ-G400"}]"#;

struct Fixture {
    _temp: tempfile::TempDir,
    root: Utf8PathBuf,
    assembly: Utf8PathBuf,
    csv: Utf8PathBuf,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let assembly = root.join("ERR4918394.fasta.gz");
    fs::write(assembly.as_std_path(), b"").unwrap();
    let csv = root.join("assemblies.csv");
    fs::write(
        csv.as_std_path(),
        format!("Run,Coverage,Assembler,Version,Filepath\nERR4918394,20.0,metaspades,3.15.3,{assembly}\n"),
    )
    .unwrap();
    Fixture {
        _temp: temp,
        root,
        assembly,
        csv,
    }
}

fn options(force: bool) -> ManifestOptions {
    ManifestOptions {
        assembly_study: "PRJ1".to_string(),
        tpa: true,
        force,
        private: false,
    }
}

#[test]
fn writes_manifest_for_run() {
    let fixture = fixture();
    let transport = MockTransport::new().reply(Method::Post, SEARCH_URL, 200, PUBLIC_RUN);
    let client = public_client(transport);
    let upload_dir = UploadDir::new(&fixture.root, "ERP125469");
    let rows = read_assemblies(&fixture.csv).unwrap();

    let summary = ManifestGenerator::new(&client, upload_dir.clone(), options(false))
        .write_manifests(&rows)
        .unwrap();
    assert_eq!(summary.written, vec!["ERR4918394".to_string()]);
    assert!(summary.skipped.is_empty());

    let manifest =
        fs::read_to_string(upload_dir.manifest_path("ERR4918394").as_std_path()).unwrap();
    let expected = format!(
        "STUDY\tPRJ1\n\
         SAMPLE\tSAMEA7687881\n\
         RUN_REF\tERR4918394\n\
         ASSEMBLYNAME\tERR4918394_d41d8cd98f00b204e9800998ecf8427e\n\
         ASSEMBLY_TYPE\tprimary metagenome\n\
         COVERAGE\t20.0\n\
         PROGRAM\tmetaspades v3.15.3\n\
         PLATFORM\tDNBSEQ-G400\n\
         FASTA\t{}\n\
         TPA\ttrue\n",
        fixture.assembly
    );
    assert_eq!(manifest, expected);
}

#[test]
fn existing_manifest_kept_without_force() {
    let fixture = fixture();
    let upload_dir = UploadDir::new(&fixture.root, "ERP125469");
    upload_dir.ensure().unwrap();
    let manifest_path = upload_dir.manifest_path("ERR4918394");
    fs::write(manifest_path.as_std_path(), "old").unwrap();
    let client = public_client(MockTransport::new());
    let rows = read_assemblies(&fixture.csv).unwrap();

    let summary = ManifestGenerator::new(&client, upload_dir, options(false))
        .write_manifests(&rows)
        .unwrap();
    assert!(summary.written.is_empty());
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(fs::read_to_string(manifest_path.as_std_path()).unwrap(), "old");
    assert_eq!(client.transport().total_calls(), 0);
}

#[test]
fn force_overwrites_manifest() {
    let fixture = fixture();
    let upload_dir = UploadDir::new(&fixture.root, "ERP125469");
    upload_dir.ensure().unwrap();
    let manifest_path = upload_dir.manifest_path("ERR4918394");
    fs::write(manifest_path.as_std_path(), "old").unwrap();
    let transport = MockTransport::new().reply(Method::Post, SEARCH_URL, 200, PUBLIC_RUN);
    let client = public_client(transport);
    let rows = read_assemblies(&fixture.csv).unwrap();

    let summary = ManifestGenerator::new(&client, upload_dir, options(true))
        .write_manifests(&rows)
        .unwrap();
    assert_eq!(summary.written.len(), 1);
    let manifest = fs::read_to_string(manifest_path.as_std_path()).unwrap();
    assert!(manifest.starts_with("STUDY\tPRJ1\n"));
}

#[test]
fn missing_run_skipped_and_batch_continues() {
    let fixture = fixture();
    let second = fixture.root.join("ERR0000002.fa.gz");
    fs::write(second.as_std_path(), b"").unwrap();
    let csv = fixture.root.join("two.csv");
    fs::write(
        csv.as_std_path(),
        format!(
            "Run,Coverage,Assembler,Version,Filepath\nERR0000002,5,megahit,1.2.9,{second}\nERR4918394,20.0,metaspades,3.15.3,{}\n",
            fixture.assembly
        ),
    )
    .unwrap();
    // the empty search result answers the first run, the record the second
    let transport = MockTransport::new()
        .reply(Method::Post, SEARCH_URL, 200, "[]")
        .reply(Method::Post, SEARCH_URL, 200, PUBLIC_RUN);
    let client = public_client(transport);
    let rows = read_assemblies(&csv).unwrap();

    let summary = ManifestGenerator::new(
        &client,
        UploadDir::new(&fixture.root, "ERP125469"),
        options(false),
    )
    .write_manifests(&rows)
    .unwrap();
    assert_eq!(summary.written, vec!["ERR4918394".to_string()]);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].run, "ERR0000002");
}

#[test]
fn missing_assembly_file_skipped_before_lookup() {
    let fixture = fixture();
    fs::remove_file(fixture.assembly.as_std_path()).unwrap();
    let client = public_client(MockTransport::new());
    let rows = read_assemblies(&fixture.csv).unwrap();

    let summary = ManifestGenerator::new(
        &client,
        UploadDir::new(&fixture.root, "ERP125469"),
        options(false),
    )
    .write_manifests(&rows)
    .unwrap();
    assert!(summary.written.is_empty());
    assert!(summary.skipped[0].reason.contains("does not exist"));
    assert_eq!(client.transport().total_calls(), 0);
}
