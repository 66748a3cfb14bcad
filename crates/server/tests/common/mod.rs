#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{ImageFormat, Rgb, RgbImage};
use pathstore::{PathStore, RepositoryConfig};
use recognition::{RecognitionError, RecognitionGateway, TextClassifier};
use server::{build_router, ServerConfig, ServerState};
use tower::ServiceExt;

pub const BOUNDARY: &str = "captcha-test-boundary";

/// Returns a fixed text and counts how often it was asked.
#[derive(Default)]
pub struct StubClassifier {
    pub calls: AtomicUsize,
}

impl StubClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextClassifier for StubClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("ab12".into())
    }

    fn name(&self) -> &str {
        "stub"
    }
}

pub struct BrokenClassifier;

impl TextClassifier for BrokenClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        Err(RecognitionError::classification("model unavailable"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

/// Takes longer than any test's recognition timeout.
pub struct SlowClassifier(pub Duration);

impl TextClassifier for SlowClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, RecognitionError> {
        std::thread::sleep(self.0);
        Ok("late".into())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

pub fn test_config(dir: &Path) -> ServerConfig {
    ServerConfig {
        path_db_file: dir.join("path_db.json"),
        log_dir: dir.join("logs"),
        metrics_enabled: false,
        ..ServerConfig::default()
    }
}

pub fn state_with(config: ServerConfig, classifier: Arc<dyn TextClassifier>) -> Arc<ServerState> {
    let paths = PathStore::open(RepositoryConfig::json_file(&config.path_db_file).build())
        .expect("open path store");
    let gateway = RecognitionGateway::with_classifier(classifier);
    Arc::new(ServerState::with_parts(config, paths, gateway))
}

pub fn app(state: &Arc<ServerState>) -> Router {
    build_router(Arc::clone(state))
}

pub fn textured(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503) ^ (x * y);
        Rgb([(v % 251) as u8, ((v >> 8) % 241) as u8, ((v >> 16) % 239) as u8])
    })
}

pub fn png(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// One multipart part: field name, optional filename, content.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, data: Vec<u8>) -> Self {
        Self { name, filename: Some("upload.png"), data }
    }

    pub fn text(name: &'a str, value: &str) -> Self {
        Self { name, filename: None, data: value.as_bytes().to_vec() }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                    .as_bytes(),
            ),
        }
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{peer}:40000").parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn multipart_request(uri: &str, parts: &[Part<'_>], peer: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap();
    from_peer(request, peer)
}

pub fn json_request(uri: &str, body: serde_json::Value, peer: &str) -> Request<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    from_peer(request, peer)
}

pub fn get_request(uri: &str, peer: &str) -> Request<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    from_peer(request, peer)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}
