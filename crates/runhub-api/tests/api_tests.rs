use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use runhub_api::{RunhubServer, ServerConfig};
use runhub_core::{ExecutionBackend, RegistryLoader};
use runhub_protocol::{ExecutionResult, StageResult};
use runhub_test_mocks::MockBackend;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

const REGISTRY: &str = r#"
runtimes:
  - {language: python, version: 3.12.0, aliases: [py], run: [python3]}
  - {language: javascript, version: 20.11.1, runtime: node, run: [node]}
  - {language: file, version: 0.0.1, accepts_opaque_files: true, run: [sh]}
"#;

fn router(backend: &MockBackend) -> Router {
    let registry = Arc::new(RegistryLoader::from_str(REGISTRY).unwrap());
    let backend: Arc<dyn ExecutionBackend> = Arc::new(backend.clone());
    RunhubServer::with_config(registry, backend, ServerConfig::new().with_logging(false))
        .build_router()
}

async fn post_json(router: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let (status, body) = get_json(router(&MockBackend::new()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["runtimes"], 3);
}

#[tokio::test]
async fn test_runtimes_listing_in_registry_order() {
    let (status, body) = get_json(router(&MockBackend::new()), "/api/v2/runtimes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"language": "python", "version": "3.12.0", "aliases": ["py"], "id": 0},
            {"language": "javascript", "version": "20.11.1", "aliases": [], "runtime": "node", "id": 1},
            {"language": "file", "version": "0.0.1", "aliases": [], "id": 2},
        ])
    );

    let (_, v3) = get_json(router(&MockBackend::new()), "/api/v3/runtimes").await;
    assert_eq!(v3, body);
}

#[tokio::test]
async fn test_execute_python_print() {
    let backend = MockBackend::new();
    let (status, body) = post_json(
        router(&backend),
        "/api/v2/execute",
        json!({"language": "python", "version": "*", "files": [{"content": "print(1)"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "python");
    assert_eq!(body["version"], "3.12.0");
    assert_eq!(body["run"]["stdout"], "1\n");
    assert_eq!(body["run"]["code"], 0);
    assert_eq!(backend.cleanups(), 1);
}

#[tokio::test]
async fn test_execute_by_runtime_id() {
    let backend = MockBackend::new();
    let (status, body) = post_json(
        router(&backend),
        "/api/v3/execute",
        json!({"runtime_id": 1, "files": [{"content": "console.log(1)"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["language"], "javascript");
    assert_eq!(backend.last_spec().unwrap().runtime.engine.as_deref(), Some("node"));
}

#[tokio::test]
async fn test_opaque_runtime_only_on_v3() {
    let files = json!([{"content": "f0VMRg==", "encoding": "base64"}]);

    let (status, _) = post_json(
        router(&MockBackend::new()),
        "/api/v3/execute",
        json!({"runtime_id": 2, "files": files.clone()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        router(&MockBackend::new()),
        "/api/v2/execute",
        json!({"language": "file", "version": "*", "files": files}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "files must include at least one utf8 encoded file");
}

#[tokio::test]
async fn test_compile_only_result_is_normalized() {
    let compile = StageResult {
        stderr: "main.c:1: error\n".to_string(),
        output: "main.c:1: error\n".to_string(),
        code: Some(1),
        ..Default::default()
    };
    let backend = MockBackend::new().with_result(ExecutionResult {
        compile: Some(compile),
        run: None,
    });
    let (status, body) = post_json(
        router(&backend),
        "/api/v2/execute",
        json!({"language": "python", "version": "3.12.0", "files": [{"content": "x"}]}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"], body["compile"]);
    assert_eq!(body["run"]["code"], 1);
}

#[tokio::test]
async fn test_validation_errors_are_400_with_message() {
    let cases = [
        (json!({"language": "python", "version": "*"}), "files is required as an array"),
        (
            json!({"language": "python", "version": "*", "files": [{"content": 1}]}),
            "files[0].content is required as a string",
        ),
        (
            json!({"language": "ruby", "version": "*", "files": [{"content": "x"}]}),
            "ruby-* runtime is unknown",
        ),
        (
            json!({"language": "javascript", "version": "*", "runtime": "bun", "files": [{"content": "x"}]}),
            "bun-javascript-* runtime is unknown",
        ),
        (
            json!({"language": "python", "version": "*", "files": [{"content": "x"}], "run_timeout": 3001}),
            "run_timeout cannot exceed the configured limit of 3000",
        ),
        (
            json!({"language": "python", "version": "*", "files": [{"content": "x"}], "compile_memory_limit": "lots"}),
            "If specified, compile_memory_limit must be a number",
        ),
        (
            json!({"language": "python", "version": "*", "files": []}),
            "files must include at least one file",
        ),
        (
            json!({"language": "python", "version": "*", "files": [{"content": "x"}], "run_timeout": 0.5}),
            "If specified, run_timeout must be a number",
        ),
        (json!([1, 2, 3]), "language is required as a string"),
    ];

    for (request, message) in cases {
        let (status, body) = post_json(router(&MockBackend::new()), "/api/v2/execute", request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"message": message}));
    }
}

#[tokio::test]
async fn test_backend_faults_are_400_with_message() {
    let (status, body) = post_json(
        router(&MockBackend::with_prime_error()),
        "/api/v2/execute",
        json!({"language": "python", "version": "*", "files": [{"content": "x"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Mock prime error"));
}

#[tokio::test]
async fn test_non_json_requests_get_415() {
    for content_type in [Some("text/plain"), None] {
        let mut request = Request::builder().method("POST").uri("/api/v2/execute");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let response = router(&MockBackend::new())
            .oneshot(request.body(Body::from("{}")).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["message"], "requests must be of type application/json");
    }
}

#[tokio::test]
async fn test_charset_parameter_is_accepted() {
    let response = router(&MockBackend::new())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v2/execute")
                .header("content-type", "application/json; charset=utf-8")
                .body(Body::from(
                    json!({"language": "py", "version": "*", "files": [{"content": "x"}]}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let response = router(&MockBackend::new())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v3/execute")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["message"].is_string());
}
