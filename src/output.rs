use std::io::{self, Write};

use serde::Serialize;

use crate::domain::EnaRecord;
use crate::manifest::ManifestSummary;
use crate::submission::RegisteredStudy;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_record(record: &EnaRecord) -> io::Result<()> {
        Self::print_json(record)
    }

    pub fn print_manifests(summary: &ManifestSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_registered(study: &RegisteredStudy) -> io::Result<()> {
        Self::print_json(study)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
