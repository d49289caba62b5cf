use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::UploaderError;

/// `<output_dir>/<study>_upload/` and the files generated inside it.
#[derive(Debug, Clone)]
pub struct UploadDir {
    study: String,
    root: Utf8PathBuf,
}

impl UploadDir {
    pub fn new(output_dir: &Utf8Path, study: &str) -> Self {
        Self {
            study: study.to_string(),
            root: output_dir.join(format!("{study}_upload")),
        }
    }

    /// Uses `directory` as is, for callers that already hold the upload dir.
    pub fn existing(directory: &Utf8Path, study: &str) -> Self {
        Self {
            study: study.to_string(),
            root: directory.to_path_buf(),
        }
    }

    pub fn in_current_dir(study: &str) -> Result<Self, UploaderError> {
        let cwd = std::env::current_dir()
            .map_err(|err| UploaderError::Filesystem(err.to_string()))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd)
            .map_err(|_| UploaderError::Filesystem("invalid working directory".to_string()))?;
        Ok(Self::new(&cwd, study))
    }

    pub fn study(&self) -> &str {
        &self.study
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn study_xml_path(&self) -> Utf8PathBuf {
        self.root.join(format!("{}_reg.xml", self.study))
    }

    pub fn submission_xml_path(&self) -> Utf8PathBuf {
        self.root.join(format!("{}_submission.xml", self.study))
    }

    pub fn release_xml_path(&self) -> Utf8PathBuf {
        self.root.join(format!("{}_release.xml", self.study))
    }

    pub fn manifest_path(&self, run: &str) -> Utf8PathBuf {
        self.root.join(format!("{run}.manifest"))
    }

    pub fn ensure(&self) -> Result<(), UploaderError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| UploaderError::Filesystem(err.to_string()))
    }
}

/// Writes through a temp file in the destination directory so readers
/// never see a half-written document.
pub fn write_file_atomic(dest: &Utf8Path, content: &[u8]) -> Result<(), UploaderError> {
    let parent = dest
        .parent()
        .ok_or_else(|| UploaderError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| UploaderError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix("ena-uploader")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| UploaderError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| UploaderError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| UploaderError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let dir = UploadDir::new(Utf8Path::new("/tmp/out"), "ERP125469");
        assert_eq!(dir.root(), Utf8Path::new("/tmp/out/ERP125469_upload"));
        assert_eq!(
            dir.study_xml_path(),
            Utf8PathBuf::from("/tmp/out/ERP125469_upload/ERP125469_reg.xml")
        );
        assert_eq!(
            dir.submission_xml_path(),
            Utf8PathBuf::from("/tmp/out/ERP125469_upload/ERP125469_submission.xml")
        );
        assert_eq!(
            dir.manifest_path("ERR4918394"),
            Utf8PathBuf::from("/tmp/out/ERP125469_upload/ERR4918394.manifest")
        );
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let dest = root.join("nested").join("file.txt");
        write_file_atomic(&dest, b"first").unwrap();
        write_file_atomic(&dest, b"second").unwrap();
        assert_eq!(fs::read_to_string(dest.as_std_path()).unwrap(), "second");
    }
}
