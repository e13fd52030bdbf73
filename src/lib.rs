//! # pageshot
//!
//! A small HTTP service that accepts a target URL and returns a full-page
//! PNG screenshot rendered by a headless Chromium browser.
//!
//! Every request gets its own browser process: launched on arrival, torn
//! down before the response leaves, never shared or pooled. That trades
//! throughput for isolation: no stale state, no cross-request cookie or
//! script contamination, no slow leak accumulating in a long-lived
//! instance. The right trade for a low-volume utility service.
//!
//! ## Request pipeline
//!
//! ```text
//! POST /screenshot {"url": ...}
//!     │ validate            (empty URL → 400, nothing launched)
//!     │ capture slot        (semaphore; brief wait, then 503)
//!     ▼
//! BrowserSession::acquire   (fresh process + one page, registered)
//!     │ navigate → network idle, 30s hard timeout
//!     │ settle delay, 2s fixed
//!     │ full-page PNG capture
//!     ▼
//! release                   (process killed, profile dir removed,
//!                            on every exit path, cancellation included)
//! ```
//!
//! Failures are tagged with the stage they died in (launch / navigate /
//! capture) and surfaced as a JSON error body; operational diagnostics stay
//! in the logs.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pageshot::{Config, ScreenshotService, Screenshotter, SessionRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let service = ScreenshotService::new(config, SessionRegistry::new());
//!
//!     let shot = service.screenshot("https://example.com").await?;
//!     println!("captured {} bytes", shot.bytes.len());
//!
//!     Ok(())
//! }
//! ```

/// Configuration loading, validation and browser launch settings
pub mod config;

/// Stage-tagged capture error taxonomy
pub mod error;

/// Browser session lifecycle and the live-session registry
pub mod session;

/// Navigate/settle/capture pipeline and the capture service
pub mod capture;

/// Axum routes and request handling
pub mod server;

/// Prometheus metrics
pub mod metrics;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod tests;

pub use capture::{capture_page, validate_target_url, Screenshot, ScreenshotService, Screenshotter};
pub use cli::{setup_logging, Cli};
pub use config::{Config, ConfigError, Viewport};
pub use error::{CaptureError, CaptureStage};
pub use server::{build_router, AppState, ScreenshotRequest};
pub use session::{BrowserSession, SessionRegistry};
