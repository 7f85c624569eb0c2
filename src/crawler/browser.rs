//! Headless-browser escalation tier.
//!
//! A single long-lived Chromium instance amortizes startup cost across
//! crawls. `BrowserManager` launches lazily, health-checks before reuse,
//! and recovers from crashes; `render_page` scopes one page per crawl and
//! closes it on every exit path.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::config::CHROME_USER_AGENT;

/// A launched browser plus its CDP handler task and profile directory.
pub struct BrowserHandle {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: PathBuf,
}

impl BrowserHandle {
    fn browser(&self) -> &Browser {
        &self.browser
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("failed to close browser cleanly: {e}");
        }
        if let Err(e) = self.browser.wait().await {
            warn!("failed to wait for browser exit: {e}");
        }
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!(
                "could not remove browser profile {}: {e}",
                self.user_data_dir.display()
            );
        }
    }
}

/// Find a Chrome/Chromium executable, honoring `CHROMIUM_PATH` first.
pub fn find_browser_executable() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CHROMIUM_PATH") {
        let path = PathBuf::from(path);
        if path.exists() {
            info!("using browser from CHROMIUM_PATH: {}", path.display());
            return Ok(path);
        }
        warn!(
            "CHROMIUM_PATH points to non-existent file: {}",
            path.display()
        );
    }

    let paths = if cfg!(target_os = "macos") {
        vec![
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        vec![
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    };

    for path_str in paths {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("found browser at: {}", path.display());
            return Ok(path);
        }
    }

    if !cfg!(target_os = "windows") {
        for cmd in &["chromium", "chromium-browser", "google-chrome", "chrome"] {
            if let Ok(output) = Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path_str.is_empty() {
                        return Ok(PathBuf::from(path_str));
                    }
                }
            }
        }
    }

    anyhow::bail!("Chrome/Chromium executable not found")
}

/// Launch a headless browser with stealth-leaning arguments.
async fn launch_browser() -> Result<BrowserHandle> {
    let chrome_path = find_browser_executable()?;

    let user_data_dir =
        std::env::temp_dir().join(format!("partscribe_chrome_{}", std::process::id()));
    std::fs::create_dir_all(&user_data_dir).context("failed to create user data directory")?;

    let config = BrowserConfigBuilder::default()
        .request_timeout(Duration::from_secs(30))
        .window_size(1920, 1080)
        .user_data_dir(user_data_dir.clone())
        .chrome_executable(chrome_path)
        .headless_mode(HeadlessMode::default())
        .arg(format!("--user-agent={CHROME_USER_AGENT}"))
        .arg("--disable-blink-features=AutomationControlled")
        .arg("--disable-infobars")
        .arg("--disable-notifications")
        .arg("--disable-extensions")
        .arg("--disable-background-networking")
        .arg("--disable-hang-monitor")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--no-sandbox")
        .arg("--mute-audio")
        .arg("--hide-scrollbars")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("failed to launch browser")?;

    let handler_task = task::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                let msg = e.to_string();
                // Chrome emits CDP events chromiumoxide does not model; those
                // deserialization misses are noise, not failures.
                let benign = msg.contains("data did not match any variant of untagged enum")
                    || msg.contains("Failed to deserialize WS response");
                if benign {
                    trace!("suppressed benign CDP error: {msg}");
                } else {
                    warn!("browser handler error: {msg}");
                }
            }
        }
        debug!("browser handler task completed");
    });

    Ok(BrowserHandle {
        browser,
        handler_task,
        user_data_dir,
    })
}

/// Lazy shared browser with health checking and crash recovery.
#[derive(Clone, Default)]
pub struct BrowserManager {
    handle: Arc<Mutex<Option<BrowserHandle>>>,
}

impl BrowserManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Get the shared browser, launching or relaunching as needed.
    pub async fn get_or_launch(&self) -> Result<Arc<Mutex<Option<BrowserHandle>>>> {
        let mut guard = self.handle.lock().await;

        if let Some(handle) = guard.as_ref() {
            match handle.browser().version().await {
                Ok(_) => {
                    drop(guard);
                    return Ok(self.handle.clone());
                }
                Err(e) => {
                    warn!("browser health check failed: {e}; relaunching");
                    if let Some(crashed) = guard.take() {
                        crashed.shutdown().await;
                    }
                }
            }
        }

        info!("launching headless browser");
        *guard = Some(launch_browser().await?);
        drop(guard);
        Ok(self.handle.clone())
    }

    /// Close the browser if running. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.take() {
            info!("shutting down headless browser");
            handle.shutdown().await;
        }
    }
}

/// Navigate to `url` in a fresh page and return the rendered HTML plus the
/// final URL. The page is closed on success and on every error path.
pub async fn render_page(
    manager: &BrowserManager,
    url: &str,
    deadline_secs: u64,
) -> Result<(String, String)> {
    let handle = manager.get_or_launch().await?;
    let guard = handle.lock().await;
    let browser = guard
        .as_ref()
        .map(BrowserHandle::browser)
        .context("browser disappeared after launch")?;

    let page = browser
        .new_page("about:blank")
        .await
        .context("failed to open page")?;

    let drive = async {
        page.goto(url).await.context("navigation failed")?;
        page.wait_for_navigation()
            .await
            .context("page load did not complete")?;
        let html = page.content().await.context("failed to read page content")?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());
        Ok::<(String, String), anyhow::Error>((html, final_url))
    };

    let result = match tokio::time::timeout(Duration::from_secs(deadline_secs), drive).await {
        Ok(inner) => inner,
        Err(_) => Err(anyhow::anyhow!(
            "browser navigation timeout after {deadline_secs}s"
        )),
    };

    // Page release happens regardless of how the drive went.
    if let Err(e) = page.close().await {
        debug!("page close failed: {e}");
    }

    result
}
