#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use ena_assembly_uploader::config::{Endpoints, RetryPolicy};
use ena_assembly_uploader::domain::WebinCredentials;
use ena_assembly_uploader::http::{HttpRequest, HttpResponse, Method, Transport, TransportError};
use ena_assembly_uploader::query::EnaClient;

pub const SEARCH_URL: &str = "https://www.ebi.ac.uk/ena/portal/api/search";
pub const REPORT_URL: &str = "https://www.ebi.ac.uk/ena/submit/report";
pub const DROPBOX_TEST_URL: &str = "https://wwwdev.ebi.ac.uk/ena/submit/drop-box/submit";

type Reply = Result<HttpResponse, TransportError>;

/// Canned replies per (method, url). The last reply of a route repeats.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, method: Method, url: &str, status: u16, body: &str) -> Self {
        self.push(method, url, Ok(HttpResponse::new(status, body)))
    }

    pub fn fail(self, method: Method, url: &str, message: &str) -> Self {
        self.push(method, url, Err(TransportError(message.to_string())))
    }

    fn push(self, method: Method, url: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.url == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let mut routes = self.routes.lock().unwrap();
        let Some(queue) = routes.get_mut(&(request.method, request.url.clone())) else {
            return Err(TransportError(format!("no route for {}", request.url)));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

pub fn credentials() -> WebinCredentials {
    WebinCredentials::new("fake-webin-999", "fakewebinpw")
}

pub fn client(transport: MockTransport) -> EnaClient<MockTransport> {
    EnaClient::new(
        transport,
        Endpoints::default(),
        RetryPolicy::default().without_delay(),
        Some(credentials()),
    )
}

pub fn public_client(transport: MockTransport) -> EnaClient<MockTransport> {
    EnaClient::new(
        transport,
        Endpoints::default(),
        RetryPolicy::default().without_delay(),
        None,
    )
}
