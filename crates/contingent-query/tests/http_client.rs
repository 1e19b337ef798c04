//! End-to-end checks of `TaskApiClient` against an in-process task API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use contingent_query::{
    BuildError, ContingencyQuery, JobOrchestrator, PollPolicy, TaskApiClient, TaskApiError,
};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{json, Value};

const EXPECTED_AUTH: &str = "Basic YWxpY2U6czNjcmV0";

#[derive(Clone, Default)]
struct ServerState {
    auth_headers: Arc<Mutex<Vec<String>>>,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl ServerState {
    fn check_auth(&self, headers: &HeaderMap) -> Result<(), StatusCode> {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push(auth.clone());
        if auth == EXPECTED_AUTH {
            Ok(())
        } else {
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn count_for(polarity: &str) -> u64 {
    match polarity {
        "11" => 30,
        "10" => 70,
        "01" => 10,
        _ => 90,
    }
}

async fn submit(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    state.check_auth(&headers)?;
    let correlation_id = body["input"]["uuid"].as_str().unwrap_or_default().to_string();
    let polarity = correlation_id.rsplit('_').next().unwrap_or_default().to_string();
    state.bodies.lock().unwrap().push(body);
    Ok(Json(json!({
        "job-id": "1",
        "job-uuid": format!("job-{polarity}"),
        "message": "Job submitted"
    })))
}

async fn status(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    state.check_auth(&headers)?;
    Ok(Json(json!([{ uuid: "JOB_DONE" }])))
}

async fn results(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Path((uuid, collection)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    state.check_auth(&headers)?;
    let polarity = uuid.trim_start_matches("job-");
    Ok(Json(json!({
        "status": "ok",
        "protocolVersion": "v2",
        "uuid": uuid,
        "message": "",
        "collection_id": collection,
        "queryResult": {"count": count_for(polarity), "datasetsCount": 1, "files": []}
    })))
}

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> TaskApiClient {
    TaskApiClient::new(
        base_url,
        "alice",
        SecretString::from("s3cret"),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_build_over_http_with_basic_auth() {
    let state = ServerState::default();
    let router = Router::new()
        .route("/task/", post(submit))
        .route("/task/status/{uuid}", get(status))
        .route("/task/results/{uuid}/{collection}", get(results))
        .with_state(state.clone());
    let base_url = spawn_server(router).await;

    let orchestrator = JobOrchestrator::new(client(&format!("{base_url}/")))
        .with_policy(PollPolicy::bounded(Duration::from_millis(1), 5));
    let table = orchestrator
        .build_contingency_table(
            &ContingencyQuery::new("8507", "Person", "24970", "Condition"),
            "RQ-CC-1",
            "user1",
        )
        .await
        .unwrap();

    assert_eq!(table.to_ordered(), [30, 70, 10, 90]);

    let auth_headers = state.auth_headers.lock().unwrap().clone();
    assert_eq!(auth_headers.len(), 12);
    assert!(auth_headers.iter().all(|h| h == EXPECTED_AUTH));

    let bodies = state.bodies.lock().unwrap().clone();
    assert_eq!(bodies.len(), 4);
    assert!(bodies.iter().all(|b| b["application"] == "AVAILABILITY_QUERY"));
    assert!(bodies.iter().all(|b| b["input"]["collection"] == json!(["RQ-CC-1"])));
}

#[tokio::test]
async fn test_server_error_surfaces_as_submission_error() {
    let router = Router::new().route(
        "/task/",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "queue unavailable") }),
    );
    let base_url = spawn_server(router).await;

    let orchestrator = JobOrchestrator::new(client(&base_url))
        .with_policy(PollPolicy::bounded(Duration::from_millis(1), 5))
        .with_max_workers(1);
    let err = orchestrator
        .build_contingency_table(
            &ContingencyQuery::new("8507", "Person", "24970", "Condition"),
            "RQ-CC-1",
            "user1",
        )
        .await
        .unwrap_err();

    match err {
        BuildError::Submission { source: TaskApiError::Api { status, body }, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "queue unavailable");
        }
        other => panic!("expected Submission error, got {other:?}"),
    }
}
