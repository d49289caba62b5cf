pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod layout;
pub mod manifest;
pub mod normalize;
pub mod output;
pub mod query;
pub mod receipt;
pub mod study_xml;
pub mod submission;
