//! End-to-end tests driving the Axum app in-process.

use axum::http::{Method, StatusCode};
use serde_json::json;

use gateway_pipeline::config::Environment;
use gateway_pipeline::errors::{GENERIC_MESSAGE, RATE_LIMIT_MESSAGE};

mod common;

use common::{get, request, send, server, test_config};

#[tokio::test]
async fn test_unknown_route_is_404_with_original_url() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/xyz").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        response.body,
        json!({
            "status": "fail",
            "message": "That route /xyz was not found on server!",
        })
    );
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_admission_denies_after_capacity() {
    let server = server(test_config(Environment::Production, 3));

    for remaining in [2, 1, 0] {
        let response = get(&server, "/api/v1/tours").await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers["x-ratelimit-limit"], "3");
        assert_eq!(
            response.headers["x-ratelimit-remaining"],
            remaining.to_string().as_str()
        );
    }

    let denied = get(&server, "/api/v1/tours").await;
    assert_eq!(denied.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(denied.body["status"], "fail");
    assert_eq!(denied.body["message"], RATE_LIMIT_MESSAGE);
    assert!(denied.headers.contains_key("retry-after"));
}

#[tokio::test]
async fn test_admission_is_per_client() {
    let server = server(test_config(Environment::Production, 1));

    let first = send(&server, request(Method::GET, "/api/v1/tours", "192.0.2.1:1000", None)).await;
    let other = send(&server, request(Method::GET, "/api/v1/tours", "192.0.2.2:1000", None)).await;
    let again = send(&server, request(Method::GET, "/api/v1/tours", "192.0.2.1:2000", None)).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(other.status, StatusCode::OK);
    assert_eq!(again.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_paths_outside_prefix_are_not_counted() {
    let server = server(test_config(Environment::Production, 1));

    for _ in 0..5 {
        let response = get(&server, "/health").await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(!response.headers.contains_key("x-ratelimit-limit"));
    }
    assert_eq!(get(&server, "/api/v1/tours").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_gated_route_still_counts() {
    let server = server(test_config(Environment::Production, 1));

    let missing = get(&server, "/api/v1/nothing").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.headers["x-ratelimit-remaining"], "0");

    let denied = get(&server, "/api/v1/tours").await;
    assert_eq!(denied.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_repeated_query_parameters_are_deduplicated() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/api/v1/tours?sort=duration&sort=price&duration=5&duration=9").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["query"]["sort"], "price");
    assert_eq!(response.body["query"]["duration"], json!(["5", "9"]));
}

#[tokio::test]
async fn test_body_and_query_are_sanitized() {
    let server = server(test_config(Environment::Production, 100));
    let body = r#"{"email": {"$gt": ""}, "name": "<script>alert(1)</script>", "tags": ["<b>"]}"#;
    let response = send(
        &server,
        request(Method::POST, "/api/v1/tours?price%5B%24gt%5D=5&difficulty=easy", "198.51.100.1:1", Some(body)),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body["body"],
        json!({
            "email": {},
            "name": "&lt;script&gt;alert(1)&lt;/script&gt;",
            "tags": ["&lt;b&gt;"],
        })
    );
    assert!(response.body["query"].get("price[$gt]").is_none());
    assert_eq!(response.body["query"]["difficulty"], "easy");
}

#[tokio::test]
async fn test_route_params_are_sanitized() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/api/v1/tours/%3Cb%3E").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["params"]["id"], "&lt;b&gt;");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let server = server(test_config(Environment::Production, 100));
    let response = send(
        &server,
        request(Method::POST, "/api/v1/tours", "198.51.100.1:1", Some("{\"name\": ")),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "fail");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = test_config(Environment::Production, 100);
    config.limits.max_body_bytes = 16;
    let server = server(config);
    let body = format!("{{\"name\": \"{}\"}}", "a".repeat(64));
    let response = send(
        &server,
        request(Method::POST, "/api/v1/tours", "198.51.100.1:1", Some(&body)),
    )
    .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(response.body["status"], "fail");
}

#[tokio::test]
async fn test_programming_error_is_hidden_in_production() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/api/v1/boom").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.body,
        json!({ "status": "error", "message": GENERIC_MESSAGE })
    );
}

#[tokio::test]
async fn test_programming_error_is_detailed_in_development() {
    let server = server(test_config(Environment::Development, 100));
    let response = get(&server, "/api/v1/boom").await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["status"], "error");
    assert_eq!(response.body["message"], "database handle missing");
    assert_eq!(response.body["error"]["name"], "InternalError");
    assert!(response.body["stack"].is_string());
}

#[tokio::test]
async fn test_cast_error_is_classified() {
    let server = server(test_config(Environment::Production, 100));
    let response = get(&server, "/api/v1/cast").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Invalid _id: wwwww.");
}

#[tokio::test]
async fn test_slow_handler_times_out_with_json_body() {
    let mut config = test_config(Environment::Production, 100);
    config.timeouts.request_secs = 1;
    let server = server(config);
    let response = get(&server, "/api/v1/slow").await;

    assert_eq!(response.status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        response.body,
        json!({ "status": "fail", "message": "Request timed out" })
    );
    assert!(response.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_handler_never_sees_unparsed_body() {
    let server = server(test_config(Environment::Production, 100));
    let body = r#"{"$where": "sleep(1000)", "n": "<script>"}"#;
    let response = send(
        &server,
        request(Method::POST, "/api/v1/tours", "198.51.100.1:1", Some(body)),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["raw"], "");
    assert_eq!(response.body["body"], json!({ "n": "&lt;script&gt;" }));
}
