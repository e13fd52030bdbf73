use std::time::Duration;
use thiserror::Error;

/// Pipeline stage a capture failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStage {
    Launch,
    Navigate,
    Capture,
}

impl CaptureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureStage::Launch => "launch",
            CaptureStage::Navigate => "navigate",
            CaptureStage::Capture => "capture",
        }
    }
}

impl std::fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed screenshot attempt, tagged with the stage it died in.
///
/// Every fault is caught where it happens, classified into one of these
/// variants and carried up to the HTTP layer; nothing browser-shaped escapes
/// past the request handler.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigate(String),

    #[error("navigation timed out after {0:?}")]
    NavigateTimeout(Duration),

    #[error("screenshot capture failed: {0}")]
    Capture(String),
}

impl CaptureError {
    pub fn stage(&self) -> CaptureStage {
        match self {
            CaptureError::Launch(_) => CaptureStage::Launch,
            CaptureError::Navigate(_) | CaptureError::NavigateTimeout(_) => CaptureStage::Navigate,
            CaptureError::Capture(_) => CaptureStage::Capture,
        }
    }

    /// Message safe to put in an HTTP response body.
    ///
    /// Launch diagnostics can contain executable paths and environment
    /// detail; those stay in the logs and the wire sees a generic message.
    /// Navigate/capture messages describe the target site and are fine to
    /// return.
    pub fn public_detail(&self) -> String {
        match self {
            CaptureError::Launch(_) => "browser failed to start".to_string(),
            CaptureError::Navigate(msg) => format!("navigation failed: {msg}"),
            CaptureError::NavigateTimeout(timeout) => {
                format!("navigation timed out after {}s", timeout.as_secs())
            }
            CaptureError::Capture(msg) => format!("screenshot capture failed: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_classification() {
        assert_eq!(
            CaptureError::Launch("spawn failed".into()).stage(),
            CaptureStage::Launch
        );
        assert_eq!(
            CaptureError::Navigate("dns error".into()).stage(),
            CaptureStage::Navigate
        );
        assert_eq!(
            CaptureError::NavigateTimeout(Duration::from_secs(30)).stage(),
            CaptureStage::Navigate
        );
        assert_eq!(
            CaptureError::Capture("target crashed".into()).stage(),
            CaptureStage::Capture
        );
    }

    #[test]
    fn test_launch_detail_is_redacted() {
        let err = CaptureError::Launch("could not spawn /usr/lib/chromium/chromium".into());
        let detail = err.public_detail();
        assert!(!detail.contains("/usr/lib"));
        assert_eq!(detail, "browser failed to start");
    }

    #[test]
    fn test_navigate_detail_is_passed_through() {
        let err = CaptureError::Navigate("net::ERR_NAME_NOT_RESOLVED".into());
        assert!(err.public_detail().contains("ERR_NAME_NOT_RESOLVED"));

        let timeout = CaptureError::NavigateTimeout(Duration::from_secs(30));
        assert!(timeout.public_detail().contains("30s"));
    }
}
