//! Captcha solver HTTP service
//!
//! Exposes text captcha recognition, base64 OCR, slider gap location and
//! selector path recommendations over HTTP, with a fixed-window quota per
//! client and route.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Endpoints
//!
//! Guarded by the per-client quota:
//!
//! - `GET /` - visitor table
//! - `GET /cssPath?href=` - most used selector path for a page
//! - `POST /captcha` - multipart text captcha (`img`, `detail`)
//! - `POST /ocr` - base64 OCR (`{image, detail}`)
//! - `POST /slideCaptcha` - slider gap (`bg_img`, `target_img`, `targetWidth`, `bgWidth`)
//! - `POST /jwocr` - base64 OCR with an in-body error envelope
//!
//! Never rate-limited:
//!
//! - `GET /health` - liveness check
//! - `GET /ready` - readiness check
//! - `GET /metrics` - Prometheus metrics

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{LogFormat, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
