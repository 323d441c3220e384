//! Headless-Chromium chart rasterizer.
//!
//! The browser is launched on the first chart and reused for the rest of the
//! run. Each chart gets its own page: the Plotly bundle is loaded, the figure
//! is plotted, and the `#chart` element is captured as PNG. The whole step is
//! bounded by the configured timeout.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use notebookify_core::config::SnapshotSettings;
use notebookify_core::contract::ChartRasterizer;
use notebookify_core::error::SnapshotError;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

const CHART_WIDTH: u32 = 900;
const CHART_HEIGHT: u32 = 600;

pub struct ChromiumRasterizer {
    settings: SnapshotSettings,
    browser: OnceCell<Browser>,
}

impl ChromiumRasterizer {
    pub fn new(settings: SnapshotSettings) -> Self {
        Self {
            settings,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> Result<&Browser, SnapshotError> {
        self.browser
            .get_or_try_init(|| launch_browser(&self.settings))
            .await
    }

    async fn render(&self, figure: &Value, output: &Path) -> Result<(), SnapshotError> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SnapshotError::Render(format!("failed to open page: {e}")))?;

        let result = plot_and_capture(&page, figure, &self.settings.plotly_js_url, output).await;
        if let Err(e) = page.close().await {
            debug!(error = %e, "[SNAPSHOT] Failed to close chart page");
        }
        result
    }
}

async fn launch_browser(settings: &SnapshotSettings) -> Result<Browser, SnapshotError> {
    info!(executable = ?settings.chrome_executable, "[SNAPSHOT] Launching headless browser");

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--remote-debugging-port=0",
    ]);
    if let Some(executable) = &settings.chrome_executable {
        builder = builder.chrome_executable(executable);
    }
    let config = builder.build().map_err(|e| {
        error!(error = %e, "[SNAPSHOT] Invalid browser configuration");
        SnapshotError::BackendUnavailable(e)
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!(error = %e, "[SNAPSHOT] Failed to launch headless browser");
        SnapshotError::BackendUnavailable(e.to_string())
    })?;

    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    debug!("[SNAPSHOT] Headless browser ready");
    Ok(browser)
}

fn chart_page(plotly_js_url: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><script src=\"{plotly_js_url}\"></script></head>\
         <body style=\"margin:0;background:#fff\">\
         <div id=\"chart\" style=\"width:{CHART_WIDTH}px;height:{CHART_HEIGHT}px\"></div></body></html>"
    )
}

fn plot_script(figure: &Value) -> String {
    format!(
        "(async () => {{\
           while (typeof window.Plotly === 'undefined') {{ await new Promise(r => setTimeout(r, 50)); }}\
           const fig = {figure};\
           await Plotly.newPlot('chart', fig.data, fig.layout || {{}}, {{ staticPlot: true }});\
           return true;\
         }})()"
    )
}

async fn plot_and_capture(
    page: &Page,
    figure: &Value,
    plotly_js_url: &str,
    output: &Path,
) -> Result<(), SnapshotError> {
    page.set_content(chart_page(plotly_js_url))
        .await
        .map_err(|e| SnapshotError::Render(format!("failed to load chart page: {e}")))?;

    let params = EvaluateParams::builder()
        .expression(plot_script(figure))
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(SnapshotError::Render)?;
    page.evaluate(params)
        .await
        .map_err(|e| SnapshotError::Render(format!("plotting failed: {e}")))?;

    let element = page
        .find_element("#chart")
        .await
        .map_err(|e| SnapshotError::Render(format!("chart element missing: {e}")))?;
    element
        .save_screenshot(CaptureScreenshotFormat::Png, output)
        .await
        .map_err(|e| SnapshotError::Render(format!("screenshot failed: {e}")))?;
    Ok(())
}

#[async_trait]
impl ChartRasterizer for ChromiumRasterizer {
    async fn rasterize(&self, figure: &Value, output: &Path) -> Result<(), SnapshotError> {
        let limit = Duration::from_secs(self.settings.timeout_secs);
        match tokio::time::timeout(limit, self.render(figure, output)).await {
            Ok(result) => result,
            Err(_) => {
                error!(path = %output.display(), timeout = ?limit, "[SNAPSHOT] Chart rendering timed out");
                Err(SnapshotError::Timeout(limit))
            }
        }
    }
}
