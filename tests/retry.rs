use std::cell::Cell;
use std::time::Duration;

use assert_matches::assert_matches;

use ena_assembly_uploader::config::RetryPolicy;
use ena_assembly_uploader::error::UploaderError;
use ena_assembly_uploader::http::{HttpResponse, TransportError, request_with_retry};

fn policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        delay: Duration::ZERO,
        run_not_found_retries: 2,
    }
}

#[test]
fn transport_failures_exhaust_attempts() {
    let calls = Cell::new(0);
    let err = request_with_retry("ERP125469", &policy(3), || {
        calls.set(calls.get() + 1);
        Err(TransportError("Test retry error".to_string()))
    })
    .unwrap_err();

    assert_eq!(calls.get(), 3);
    assert_matches!(
        &err,
        UploaderError::NotFoundOrUnreachable { accession, attempts: 3 } if accession == "ERP125469"
    );
    assert_eq!(
        err.to_string(),
        "Could not find ERP125469 in ENA after 3 attempts."
    );
}

#[test]
fn attempt_budget_is_a_parameter() {
    let calls = Cell::new(0);
    let err = request_with_retry("ERR1", &policy(5), || {
        calls.set(calls.get() + 1);
        Err(TransportError("timed out".to_string()))
    })
    .unwrap_err();
    assert_eq!(calls.get(), 5);
    assert_matches!(err, UploaderError::NotFoundOrUnreachable { attempts: 5, .. });
}

#[test]
fn http_error_is_not_retried() {
    let calls = Cell::new(0);
    let err = request_with_retry("ERPXYZ", &policy(3), || {
        calls.set(calls.get() + 1);
        Ok(HttpResponse::new(500, "Test failure error"))
    })
    .unwrap_err();

    assert_eq!(calls.get(), 1);
    assert_matches!(
        err,
        UploaderError::HttpStatus { status: 500, message, .. } if message == "Test failure error"
    );
}

#[test]
fn recovers_after_transient_failure() {
    let calls = Cell::new(0);
    let response = request_with_retry("ERR1", &policy(3), || {
        calls.set(calls.get() + 1);
        if calls.get() < 3 {
            Err(TransportError("connection reset".to_string()))
        } else {
            Ok(HttpResponse::new(200, "[]"))
        }
    })
    .unwrap();
    assert_eq!(calls.get(), 3);
    assert_eq!(response.body, "[]");
}

#[test]
fn no_content_is_returned_to_caller() {
    let response =
        request_with_retry("ERR1", &policy(3), || Ok(HttpResponse::new(204, ""))).unwrap();
    assert!(response.is_no_content());
}
