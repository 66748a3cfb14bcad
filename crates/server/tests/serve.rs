//! End to end over a real socket: peer addresses and the Prometheus exporter.

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::*;
use metrics_exporter_prometheus::PrometheusBuilder;
use server::{build_router, ServerState};

#[tokio::test]
async fn serves_captcha_routes_over_tcp() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.metrics_enabled = true;

    let paths = pathstore::PathStore::open(
        pathstore::RepositoryConfig::json_file(&config.path_db_file).build(),
    )
    .unwrap();
    let gateway =
        recognition::RecognitionGateway::with_classifier(Arc::new(StubClassifier::default()));
    let mut state = ServerState::with_parts(config, paths, gateway);
    state.metrics = Some(PrometheusBuilder::new().install_recorder().unwrap());
    let state = Arc::new(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let form = reqwest::multipart::Form::new()
        .part(
            "img",
            reqwest::multipart::Part::bytes(png(&textured(48, 20))).file_name("c.png"),
        )
        .text("detail", r##"{"href":"https://tcp.test/","path":"#c"}"##);
    let response = client
        .post(format!("{base}/captcha"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["data"]["code"], "ab12");

    let page = client.get(format!("{base}/")).send().await.unwrap().text().await.unwrap();
    assert!(page.contains("<td>127.0.0.1</td><td>1</td>"), "{page}");

    let metrics = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("captcha_requests_total"), "{metrics}");
    assert!(metrics.contains("captcha_path_observations_total"), "{metrics}");
}
