//! Browser session lifecycle
//!
//! One session is one exclusively-owned headless browser process plus the
//! single page opened inside it, scoped to one request. Sessions are never
//! shared, pooled or reused; isolation is bought by paying the launch cost
//! on every request. A process-wide [`SessionRegistry`] tracks live sessions
//! so shutdown can release whatever is still in flight.

use crate::config::{build_browser_config, Config};
use crate::error::CaptureError;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::page::Page;
use dashmap::DashMap;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tracked set of live sessions, add-on-acquire / remove-on-release.
///
/// On process shutdown every remaining entry is released, so an in-flight
/// request can never leave an orphaned browser behind.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Arc<SessionInner>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.sessions.len()
    }

    fn register(&self, inner: Arc<SessionInner>) {
        self.sessions.insert(inner.id, inner);
    }

    fn unregister(&self, id: &Uuid) {
        self.sessions.remove(id);
    }

    /// Release every live session. Called once during shutdown, after the
    /// HTTP server has stopped accepting requests.
    pub async fn shutdown(&self) {
        let live: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if !live.is_empty() {
            info!("releasing {} in-flight browser session(s)", live.len());
        }
        for inner in live {
            inner.release().await;
        }
        self.sessions.clear();
    }
}

struct SessionInner {
    id: Uuid,
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    release_grace: Duration,
    released: AtomicBool,
}

impl SessionInner {
    /// Idempotent teardown. Never fails; problems are logged and the next
    /// step runs anyway so partial state cannot survive.
    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let _ = self.page.clone().close().await;
        {
            let mut browser = self.browser.lock().await;
            shutdown_browser(&mut browser, self.release_grace).await;
        }
        self.handler.abort();
        remove_profile_dir(&self.profile_dir).await;

        crate::metrics::session_closed();
        debug!(session = %self.id, "browser session released");
    }
}

/// One headless browser process + one page, owned by a single request.
pub struct BrowserSession {
    inner: Arc<SessionInner>,
    registry: SessionRegistry,
}

impl BrowserSession {
    /// Launch an isolated browser and open its single page.
    ///
    /// Partial failures (process started, page creation failed) are torn
    /// down here before the error returns; callers never see half-built
    /// sessions.
    pub async fn acquire(
        config: &Config,
        registry: &SessionRegistry,
    ) -> Result<Self, CaptureError> {
        let id = Uuid::new_v4();
        let profile_dir = std::env::temp_dir().join(format!(
            "pageshot-profile-{}-{}",
            std::process::id(),
            id
        ));
        tokio::fs::create_dir_all(&profile_dir)
            .await
            .map_err(|e| CaptureError::Launch(format!("failed to create profile dir: {e}")))?;

        let browser_config = match build_browser_config(config, &profile_dir) {
            Ok(browser_config) => browser_config,
            Err(e) => {
                remove_profile_dir(&profile_dir).await;
                return Err(CaptureError::Launch(e));
            }
        };

        let (mut browser, mut handler) = match Browser::launch(browser_config).await {
            Ok(pair) => pair,
            Err(e) => {
                remove_profile_dir(&profile_dir).await;
                return Err(CaptureError::Launch(e.to_string()));
            }
        };

        // CDP traffic flows through the handler stream; it must be polled
        // for the lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {e}");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(&mut browser, config.release_grace).await;
                handler_task.abort();
                remove_profile_dir(&profile_dir).await;
                return Err(CaptureError::Launch(format!("failed to open page: {e}")));
            }
        };

        let device_metrics = SetDeviceMetricsOverrideParams::builder()
            .width(config.viewport.width)
            .height(config.viewport.height)
            .device_scale_factor(config.viewport.device_scale_factor)
            .mobile(false)
            .build()
            .map_err(CaptureError::Launch);
        let applied = match device_metrics {
            Ok(params) => page.execute(params).await.map_err(|e| {
                CaptureError::Launch(format!("failed to apply viewport: {e}"))
            }),
            Err(e) => Err(e),
        };
        if let Err(e) = applied {
            let _ = page.clone().close().await;
            shutdown_browser(&mut browser, config.release_grace).await;
            handler_task.abort();
            remove_profile_dir(&profile_dir).await;
            return Err(e);
        }

        let inner = Arc::new(SessionInner {
            id,
            browser: Mutex::new(browser),
            page,
            handler: handler_task,
            profile_dir,
            release_grace: config.release_grace,
            released: AtomicBool::new(false),
        });
        registry.register(inner.clone());
        crate::metrics::session_opened();
        info!(session = %id, "browser session acquired");

        Ok(Self {
            inner,
            registry: registry.clone(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn page(&self) -> &Page {
        &self.inner.page
    }

    /// Terminate the browser process and reclaim all session resources.
    /// Safe to call more than once.
    pub async fn release(&self) {
        self.inner.release().await;
        self.registry.unregister(&self.inner.id);
    }
}

impl Drop for BrowserSession {
    // Backstop for abandoned requests: when a client disconnects, axum drops
    // the handler future mid-capture and the explicit release never runs.
    // The browser process must not outlive its request either way.
    fn drop(&mut self) {
        if self.inner.released.load(Ordering::SeqCst) {
            return;
        }
        warn!(session = %self.inner.id, "session dropped without release, reclaiming");
        let inner = self.inner.clone();
        let registry = self.registry.clone();
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                inner.release().await;
                registry.unregister(&inner.id);
            });
        }
    }
}

/// Close the browser, give it a bounded grace period to exit, then kill.
async fn shutdown_browser(browser: &mut Browser, grace: Duration) {
    if let Err(e) = browser.close().await {
        debug!("browser close failed: {e}");
        let _ = browser.kill().await;
    }
    if timeout(grace, browser.wait()).await.is_err() {
        warn!("browser did not exit within {grace:?}, killing");
        let _ = browser.kill().await;
    }
}

async fn remove_profile_dir(profile_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
        debug!(
            "failed to remove profile dir {}: {e}",
            profile_dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_starts_empty() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.live_count(), 0);
    }

    #[tokio::test]
    async fn test_registry_shutdown_with_no_sessions() {
        let registry = SessionRegistry::new();
        registry.shutdown().await;
        assert_eq!(registry.live_count(), 0);
    }
}
