//! Core web-vitals read from buffered performance entries.

use super::close_quietly;
use crate::error::{Result, ScanError};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, PageSession, WaitPolicy};

/// Resolves once buffered LCP and layout-shift entries have been delivered.
const VITALS_SCRIPT: &str = r"new Promise((resolve) => {
  const vitals = { largestContentfulPaint: null, cumulativeLayoutShift: null };
  const observe = (type, onEntries) => {
    try {
      new PerformanceObserver((list) => onEntries(list.getEntries())).observe({ type, buffered: true });
    } catch (_) {}
  };
  observe('largest-contentful-paint', (entries) => {
    const last = entries[entries.length - 1];
    if (last) vitals.largestContentfulPaint = last.renderTime || last.loadTime || last.startTime;
  });
  observe('layout-shift', (entries) => {
    const shift = entries.filter((e) => !e.hadRecentInput).reduce((sum, e) => sum + e.value, 0);
    vitals.cumulativeLayoutShift = (vitals.cumulativeLayoutShift || 0) + shift;
  });
  setTimeout(() => resolve(vitals), 1000);
})";

/// Web-vitals for the home page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceScan {
    /// Largest contentful paint in milliseconds
    pub largest_contentful_paint: Option<f64>,
    /// Cumulative layout shift score
    pub cumulative_layout_shift: Option<f64>,
}

/// Load the target and read its web-vitals.
pub async fn scan(browser: &dyn BrowserInstance, target: &ScanTarget) -> Result<PerformanceScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target).await;
    close_quietly(page).await;
    result
}

async fn inspect(page: &dyn PageSession, target: &ScanTarget) -> Result<PerformanceScan> {
    page.navigate(target.as_str(), WaitPolicy::Load).await?;
    let value = page.evaluate(VITALS_SCRIPT).await?;
    serde_json::from_value(value)
        .map_err(|e| ScanError::Other(format!("unexpected performance result: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeBrowser, FakeResponse, FakeSite};
    use serde_json::json;

    fn browser(vitals: serde_json::Value) -> FakeBrowser {
        FakeBrowser::new(
            FakeSite::default()
                .with_page("https://18f.gov/", FakeResponse::html("https://18f.gov/", "<html></html>"))
                .with_evaluation("largest-contentful-paint", vitals),
        )
    }

    #[tokio::test]
    async fn test_reads_vitals() {
        let browser = browser(json!({
            "largestContentfulPaint": 1234.5,
            "cumulativeLayoutShift": 0.02
        }));
        let target = ScanTarget::parse("18f.gov").expect("target");

        let result = scan(&browser, &target).await.expect("scan");
        assert_eq!(result.largest_contentful_paint, Some(1234.5));
        assert_eq!(result.cumulative_layout_shift, Some(0.02));
    }

    #[tokio::test]
    async fn test_missing_metrics_are_none() {
        let browser = browser(json!({
            "largestContentfulPaint": null,
            "cumulativeLayoutShift": null
        }));
        let target = ScanTarget::parse("18f.gov").expect("target");

        let result = scan(&browser, &target).await.expect("scan");
        assert_eq!(result, PerformanceScan::default());
        assert_eq!(browser.open_pages(), 0);
    }
}
