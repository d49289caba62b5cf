use std::fmt;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::warn;

use crate::config::RetryPolicy;
use crate::domain::WebinCredentials;
use crate::error::UploaderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartContent {
    Text(String),
    File { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub content: PartContent,
}

impl FormPart {
    pub fn text(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            content: PartContent::Text(value.to_string()),
        }
    }

    pub fn file(name: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content: PartContent::File {
                file_name: file_name.to_string(),
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Form(Vec<(String, String)>),
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub credentials: Option<WebinCredentials>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, credentials: Option<&WebinCredentials>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            credentials: credentials.cloned(),
            body: Body::Empty,
        }
    }

    pub fn post_form(url: impl Into<String>, fields: &[(&str, String)]) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            credentials: None,
            body: Body::Form(
                fields
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect(),
            ),
        }
    }

    pub fn post_multipart(
        url: impl Into<String>,
        credentials: &WebinCredentials,
        parts: Vec<FormPart>,
    ) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            credentials: Some(credentials.clone()),
            body: Body::Multipart(parts),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_no_content(&self) -> bool {
        self.status == 204
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// A failure below HTTP: the request never produced a status line or the
/// body could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError(pub String);

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait Transport: Send + Sync {
    /// Any HTTP status, including 4xx/5xx, comes back as `Ok`.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, UploaderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("ena-uploader/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UploaderError::HttpClient(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| UploaderError::HttpClient(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        builder = match &request.body {
            Body::Empty => builder,
            // `form` sets application/x-www-form-urlencoded
            Body::Form(fields) => builder.form(fields),
            Body::Multipart(parts) => builder.multipart(multipart_form(parts)),
        };

        let response = builder
            .send()
            .map_err(|err| TransportError(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| TransportError(err.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

fn multipart_form(parts: &[FormPart]) -> Form {
    parts.iter().fold(Form::new(), |form, part| match &part.content {
        PartContent::Text(value) => form.text(part.name.clone(), value.clone()),
        PartContent::File { file_name, bytes } => form.part(
            part.name.clone(),
            Part::bytes(bytes.clone()).file_name(file_name.clone()),
        ),
    })
}

/// Runs `perform` until it yields an HTTP response, sleeping `policy.delay`
/// between transport failures. Error statuses are returned as `HttpStatus`
/// on the first occurrence.
pub fn request_with_retry<F>(
    accession: &str,
    policy: &RetryPolicy,
    mut perform: F,
) -> Result<HttpResponse, UploaderError>
where
    F: FnMut() -> Result<HttpResponse, TransportError>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match perform() {
            Ok(response) if response.is_error() => {
                return Err(UploaderError::HttpStatus {
                    accession: accession.to_string(),
                    status: response.status,
                    message: response.body,
                });
            }
            Ok(response) => return Ok(response),
            Err(err) => {
                warn!(accession, attempt, error = %err, "ENA request failed");
                if attempt >= policy.max_attempts {
                    return Err(UploaderError::NotFoundOrUnreachable {
                        accession: accession.to_string(),
                        attempts: attempt,
                    });
                }
                thread::sleep(policy.delay);
            }
        }
    }
}
