use std::thread;

use tracing::{info, warn};

use crate::config::{Endpoints, RetryPolicy};
use crate::domain::{
    AccessMode, AccessionKind, EnaRecord, QueryContext, RunRecord, StudyNamespace, StudyRecord,
    WebinCredentials,
};
use crate::error::UploaderError;
use crate::http::{HttpRequest, HttpResponse, Transport, request_with_retry};
use crate::normalize::{RunPayload, StudyPayload, normalize_run, normalize_study, parse_study_xml};

const STUDY_FIELDS: &str = "study_accession,study_title,study_description,first_public";
const RUN_FIELDS: &str = "run_accession,sample_accession,instrument_model";

/// Looks up study and run metadata in ENA, through the public portal search
/// or the authenticated Webin reports API.
pub struct EnaClient<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    retry: RetryPolicy,
    credentials: Option<WebinCredentials>,
}

impl<T: Transport> EnaClient<T> {
    pub fn new(
        transport: T,
        endpoints: Endpoints,
        retry: RetryPolicy,
        credentials: Option<WebinCredentials>,
    ) -> Self {
        Self {
            transport,
            endpoints,
            retry,
            credentials,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invalid accessions and missing credentials fail here, before any
    /// request is sent.
    pub fn build_query(&self, accession: &str, private: bool) -> Result<EnaRecord, UploaderError> {
        let context = QueryContext::new(accession, private, self.credentials.as_ref())?;
        match context.accession.kind() {
            AccessionKind::Study(namespace) => {
                self.get_study(&context, namespace).map(EnaRecord::Study)
            }
            AccessionKind::Run => self.get_run(&context).map(EnaRecord::Run),
            AccessionKind::Unrecognized => Err(UploaderError::InvalidAccession(
                context.accession.to_string(),
            )),
        }
    }

    pub fn get_study(
        &self,
        context: &QueryContext,
        namespace: StudyNamespace,
    ) -> Result<StudyRecord, UploaderError> {
        let accession = context.accession.as_str();
        match &context.mode {
            AccessMode::Public => {
                let request = self.search_request(
                    "study",
                    namespace.search_field(),
                    accession,
                    STUDY_FIELDS,
                );
                let response = self.send(accession, &request)?;
                if response.is_no_content() {
                    return Err(UploaderError::NoDataFound {
                        accession: accession.to_string(),
                        detail: "search returned no content".to_string(),
                    });
                }
                let record = normalize_study(accession, StudyPayload::Public(&response.body))?;
                log_lookup(context, &request.url);
                Ok(record)
            }
            AccessMode::Private(credentials) => {
                let xml_request = HttpRequest::get(
                    format!("{}/studies/xml/{accession}", self.endpoints.private_report),
                    Some(credentials),
                );
                let xml = self.send(accession, &xml_request)?;
                if xml.is_no_content() {
                    return Err(UploaderError::NoDataFound {
                        accession: accession.to_string(),
                        detail: "study XML returned no content".to_string(),
                    });
                }
                // a bad XML document fails the lookup before the report is fetched
                let text = parse_study_xml(accession, &xml.body)?;

                let report_request = HttpRequest::get(
                    format!("{}/studies/{accession}", self.endpoints.private_report),
                    Some(credentials),
                );
                let report = self.send(accession, &report_request)?;
                let record = normalize_study(
                    accession,
                    StudyPayload::Private {
                        text,
                        report: &report.body,
                    },
                )?;
                log_lookup(context, &report_request.url);
                Ok(record)
            }
        }
    }

    /// A 204 on a run lookup means the run is not indexed yet, so it is
    /// asked again a bounded number of times.
    pub fn get_run(&self, context: &QueryContext) -> Result<RunRecord, UploaderError> {
        let accession = context.accession.as_str();
        let request = match &context.mode {
            AccessMode::Public => {
                self.search_request("read_run", "run_accession", accession, RUN_FIELDS)
            }
            AccessMode::Private(credentials) => HttpRequest::get(
                format!("{}/runs/{accession}", self.endpoints.private_report),
                Some(credentials),
            ),
        };

        let max_lookups = self.retry.run_not_found_retries + 1;
        let mut lookups = 0u32;
        let response = loop {
            lookups += 1;
            let response = self.send(accession, &request)?;
            if !response.is_no_content() {
                break response;
            }
            if lookups >= max_lookups {
                return Err(UploaderError::RunNotFound {
                    accession: accession.to_string(),
                    attempts: lookups,
                });
            }
            warn!(accession, attempt = lookups, "run not found yet, asking again");
            thread::sleep(self.retry.delay);
        };

        let payload = match context.mode {
            AccessMode::Public => RunPayload::Public(&response.body),
            AccessMode::Private(_) => RunPayload::Private(&response.body),
        };
        let record = normalize_run(accession, payload)?;
        log_lookup(context, &request.url);
        Ok(record)
    }

    fn search_request(
        &self,
        result: &str,
        field: &str,
        accession: &str,
        fields: &str,
    ) -> HttpRequest {
        HttpRequest::post_form(
            self.endpoints.public_search.clone(),
            &[
                ("result", result.to_string()),
                ("query", format!("{field}=\"{accession}\"")),
                ("fields", fields.to_string()),
                ("format", "json".to_string()),
                ("dataPortal", "ena".to_string()),
            ],
        )
    }

    fn send(&self, accession: &str, request: &HttpRequest) -> Result<HttpResponse, UploaderError> {
        request_with_retry(accession, &self.retry, || self.transport.send(request))
    }
}

fn log_lookup(context: &QueryContext, endpoint: &str) {
    info!(
        accession = %context.accession,
        mode = context.mode.label(),
        endpoint,
        "{} {} data returned from ENA",
        context.accession,
        context.mode.label()
    );
}
