//! Capture pipeline
//!
//! Navigate, wait for the network to settle, pause for deferred rendering,
//! capture a full-page PNG. Every stage failure is classified into a
//! [`CaptureError`] at its origin. [`ScreenshotService`] wraps the pipeline
//! in the one-session-per-request contract: acquire, capture, release on
//! every exit path.

use crate::config::Config;
use crate::error::CaptureError;
use crate::session::{BrowserSession, SessionRegistry};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use std::time::Instant;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};
use url::Url;

/// A successful capture: raw image bytes with a fixed MIME type.
#[derive(Debug, Clone)]
pub struct Screenshot {
    pub bytes: Vec<u8>,
}

impl Screenshot {
    pub const MIME: &'static str = "image/png";
}

/// URL well-formedness lives here, not in the HTTP layer: anything that is
/// not an absolute http(s) URL with a host fails at the navigate stage.
pub fn validate_target_url(target_url: &str) -> Result<Url, CaptureError> {
    let url = Url::parse(target_url)
        .map_err(|e| CaptureError::Navigate(format!("invalid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(CaptureError::Navigate(format!(
                "unsupported URL scheme `{scheme}`"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(CaptureError::Navigate("URL has no host".to_string()));
    }

    Ok(url)
}

/// Run the navigate → settle → capture sequence on an already-acquired page.
///
/// Redirects are followed transparently by the browser. A page that never
/// goes network-idle inside the timeout is a navigate failure, not a
/// partial success; there is no best-effort screenshot.
pub async fn capture_page(
    page: &Page,
    target_url: &str,
    config: &Config,
) -> Result<Screenshot, CaptureError> {
    let url = validate_target_url(target_url)?;

    let navigation = async {
        page.goto(url.as_str()).await?;
        page.wait_for_navigation().await?;
        Ok::<_, chromiumoxide::error::CdpError>(())
    };
    match timeout(config.navigation_timeout, navigation).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(CaptureError::Navigate(e.to_string())),
        Err(_) => return Err(CaptureError::NavigateTimeout(config.navigation_timeout)),
    }

    // Unconditional pause for deferred client-side rendering (animations,
    // lazy content). Not tied to any readiness signal.
    sleep(config.settle_delay).await;

    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(true)
        .build();
    let bytes = page
        .screenshot(params)
        .await
        .map_err(|e| CaptureError::Capture(e.to_string()))?;

    Ok(Screenshot { bytes })
}

/// Seam between the HTTP layer and the browser. The production
/// implementation is [`ScreenshotService`]; tests substitute a stub so the
/// handler contract can be exercised without Chromium.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn screenshot(&self, target_url: &str) -> Result<Screenshot, CaptureError>;
}

/// Production capture service: one fresh browser session per call, released
/// unconditionally before the result is returned.
pub struct ScreenshotService {
    config: Config,
    registry: SessionRegistry,
}

impl ScreenshotService {
    pub fn new(config: Config, registry: SessionRegistry) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}

#[async_trait]
impl Screenshotter for ScreenshotService {
    async fn screenshot(&self, target_url: &str) -> Result<Screenshot, CaptureError> {
        let started = Instant::now();

        let session = match BrowserSession::acquire(&self.config, &self.registry).await {
            Ok(session) => session,
            Err(e) => {
                // Full diagnostics stay here; the caller gets the redacted
                // form via public_detail.
                warn!("session acquisition failed: {e}");
                crate::metrics::record_capture_error(&e, started.elapsed());
                return Err(e);
            }
        };

        let result = capture_page(session.page(), target_url, &self.config).await;
        session.release().await;

        let elapsed = started.elapsed();
        match &result {
            Ok(shot) => {
                info!(
                    session = %session.id(),
                    bytes = shot.bytes.len(),
                    "captured {target_url} in {elapsed:?}"
                );
                crate::metrics::record_capture_success(elapsed);
            }
            Err(e) => {
                warn!(
                    session = %session.id(),
                    stage = %e.stage(),
                    "capture of {target_url} failed: {e}"
                );
                crate::metrics::record_capture_error(e, elapsed);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureStage;

    #[test]
    fn test_valid_urls() {
        assert!(validate_target_url("https://example.com").is_ok());
        assert!(validate_target_url("http://example.com/path?q=1").is_ok());
        assert!(validate_target_url("https://sub.example.com:8443/").is_ok());
    }

    #[test]
    fn test_malformed_url_fails_at_navigate_stage() {
        let err = validate_target_url("not a url").unwrap_err();
        assert_eq!(err.stage(), CaptureStage::Navigate);
    }

    #[test]
    fn test_non_http_scheme_is_rejected() {
        let err = validate_target_url("ftp://example.com").unwrap_err();
        assert_eq!(err.stage(), CaptureStage::Navigate);
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_relative_url_is_rejected() {
        assert!(validate_target_url("/just/a/path").is_err());
        assert!(validate_target_url("example.com").is_err());
    }
}
