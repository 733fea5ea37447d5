//! Jenkins client tests against a local fake `buildWithParameters` endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Router,
};

use patchwork_ci_core::{
    build_request,
    config::JenkinsConfig,
    testing::fixtures,
    BuildTrigger, JenkinsClient, TriggerError,
};

#[derive(Debug, Clone)]
struct ReceivedBuild {
    pipeline: String,
    query: HashMap<String, String>,
    form: Vec<(String, String)>,
}

impl ReceivedBuild {
    fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

type Received = Arc<Mutex<Vec<ReceivedBuild>>>;

async fn build_with_parameters(
    State(received): State<Received>,
    Path(pipeline): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    Form(form): Form<Vec<(String, String)>>,
) -> Response {
    let locked = pipeline == "locked";
    received.lock().unwrap().push(ReceivedBuild {
        pipeline,
        query,
        form,
    });

    if locked {
        return (StatusCode::FORBIDDEN, "No valid crumb was included in the request").into_response();
    }

    (
        StatusCode::CREATED,
        [(LOCATION, "http://jenkins.test/queue/item/7/")],
    )
        .into_response()
}

async fn spawn_fake() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .route("/job/{pipeline}/buildWithParameters", post(build_with_parameters))
        .with_state(Arc::clone(&received));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), received)
}

fn config(url: &str, pipeline: &str) -> JenkinsConfig {
    JenkinsConfig {
        url: url.to_string(),
        pipeline: pipeline.to_string(),
        token: "tok&en".to_string(),
        job_owner: "ci@example.com".to_string(),
        description: "test".to_string(),
        timeout_secs: 5,
        verify_tls: false,
    }
}

#[tokio::test]
async fn test_submit_build_sends_form_and_query() {
    let (url, received) = spawn_fake().await;
    let client = JenkinsClient::new(config(&url, "kernel-patchwork")).unwrap();

    let repo = fixtures::repo_config("rhel8");
    let series = fixtures::series(7, true, 2);
    let params = build_request(&repo, &series).unwrap();

    let submission = client
        .submit_build(&params, Some(series.url.as_str()))
        .await
        .unwrap();

    assert_eq!(submission.status, 201);
    assert_eq!(
        submission.queue_url.as_deref(),
        Some("http://jenkins.test/queue/item/7/")
    );

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let build = &received[0];
    assert_eq!(build.pipeline, "kernel-patchwork");

    assert_eq!(build.query.get("token").map(String::as_str), Some("tok&en"));
    assert_eq!(build.query.get("description").map(String::as_str), Some("test"));
    assert_eq!(
        build.query.get("cause").map(String::as_str),
        Some("http://patchwork.test/api/series/7/")
    );

    assert_eq!(build.field("KERNEL_REPO"), Some("git://git.test/rhel8.git"));
    assert_eq!(build.field("KERNEL_REF"), Some("main"));
    assert_eq!(
        build.field("PATCHWORK_URLS"),
        Some("http://patchwork.test/patch/701 http://patchwork.test/patch/702")
    );
    assert_eq!(build.field("CONFIG_TYPE"), Some("url"));
    assert_eq!(build.field("CONFIG_URL"), Some("http://configs.test/rhel8.config"));
    assert_eq!(build.field("KERNEL_BUILD_ARCHES"), Some("x86_64 aarch64"));
    assert_eq!(build.field("BUILDER_OS"), Some("fedora"));
    assert_eq!(build.field("DISPLAY_NAME"), Some("rhel8 | 7 | series 7"));
    assert_eq!(build.field("BEAKER_JOB_OWNER"), Some("ci@example.com"));
}

#[tokio::test]
async fn test_submit_build_without_config_url() {
    let (url, received) = spawn_fake().await;
    let client = JenkinsClient::new(config(&url, "kernel-patchwork")).unwrap();

    let mut repo = fixtures::repo_config("rhel8");
    repo.config_type = "rhel".to_string();
    let params = build_request(&repo, &fixtures::series(8, true, 1)).unwrap();

    client.submit_build(&params, None).await.unwrap();

    let received = received.lock().unwrap();
    let build = &received[0];
    assert_eq!(build.field("CONFIG_TYPE"), Some("rhel"));
    assert_eq!(build.field("CONFIG_URL"), None);
    assert!(!build.query.contains_key("cause"));
}

#[tokio::test]
async fn test_rejected_build() {
    let (url, _received) = spawn_fake().await;
    let client = JenkinsClient::new(config(&url, "locked")).unwrap();
    let params = build_request(&fixtures::repo_config("rhel8"), &fixtures::series(9, true, 1)).unwrap();

    let err = client.submit_build(&params, None).await.unwrap_err();

    match err {
        TriggerError::Rejected { status, body } => {
            assert_eq!(status, 403);
            assert!(body.starts_with("No valid crumb"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unreachable_jenkins_error_hides_token() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = config(&format!("http://{}", addr), "kernel-patchwork");
    config.token = "SUPERSECRETTOKEN".to_string();
    let client = JenkinsClient::new(config).unwrap();
    let params = build_request(&fixtures::repo_config("rhel8"), &fixtures::series(9, true, 1)).unwrap();

    let err = client.submit_build(&params, None).await.unwrap_err();

    assert!(matches!(err, TriggerError::Transport(_)));
    let message = err.to_string();
    assert!(!message.contains("SUPERSECRETTOKEN"), "{}", message);
    assert!(!message.contains("token="), "{}", message);
}

#[tokio::test]
async fn test_timed_out_submission_error_hides_token() {
    let app = Router::new().route(
        "/job/{pipeline}/buildWithParameters",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::CREATED
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut config = config(&format!("http://{}", addr), "kernel-patchwork");
    config.token = "SUPERSECRETTOKEN".to_string();
    config.timeout_secs = 1;
    let client = JenkinsClient::new(config).unwrap();
    let params = build_request(&fixtures::repo_config("rhel8"), &fixtures::series(9, true, 1)).unwrap();

    let err = client.submit_build(&params, None).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("timed out"), "{}", message);
    assert!(!message.contains("SUPERSECRETTOKEN"), "{}", message);
}
