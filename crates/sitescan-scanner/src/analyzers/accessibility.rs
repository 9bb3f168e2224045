//! In-page accessibility audit.

use super::close_quietly;
use crate::error::{Result, ScanError};
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use sitescan_browser::{BrowserInstance, PageSession, WaitPolicy};

/// Counts violations per rule inside the rendered document.
const AUDIT_SCRIPT: &str = r#"(() => {
  const text = (el) => (el.innerText || el.textContent || '').trim();
  const labelled = (el) =>
    el.getAttribute('aria-label') || el.getAttribute('aria-labelledby') || el.getAttribute('title') ||
    (el.id && document.querySelector(`label[for="${CSS.escape(el.id)}"]`)) || el.closest('label');
  const controls = [...document.querySelectorAll('input, select, textarea')]
    .filter((el) => !['hidden', 'submit', 'button', 'reset', 'image'].includes((el.type || '').toLowerCase()));
  const ids = {};
  document.querySelectorAll('[id]').forEach((el) => { ids[el.id] = (ids[el.id] || 0) + 1; });
  return {
    sitescanAudit: true,
    missingImageAlt: document.querySelectorAll('img:not([alt])').length,
    unlabeledFormControls: controls.filter((el) => !labelled(el)).length,
    emptyLinks: [...document.querySelectorAll('a[href]')]
      .filter((el) => !text(el) && !el.getAttribute('aria-label') && !el.querySelector('img[alt]:not([alt=""])')).length,
    emptyButtons: [...document.querySelectorAll('button')]
      .filter((el) => !text(el) && !el.getAttribute('aria-label') && !el.getAttribute('title')).length,
    missingDocumentLanguage: document.documentElement.hasAttribute('lang') ? 0 : 1,
    missingPageTitle: document.title.trim() ? 0 : 1,
    duplicateIds: Object.values(ids).filter((n) => n > 1).length,
  };
})()"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditCounts {
    missing_image_alt: u32,
    unlabeled_form_controls: u32,
    empty_links: u32,
    empty_buttons: u32,
    missing_document_language: u32,
    missing_page_title: u32,
    duplicate_ids: u32,
}

/// Accessibility rule violations on the home page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityScan {
    /// `<img>` without an `alt` attribute
    pub missing_image_alt: u32,
    /// Form controls without a label
    pub unlabeled_form_controls: u32,
    /// Links without an accessible name
    pub empty_links: u32,
    /// Buttons without an accessible name
    pub empty_buttons: u32,
    /// 1 when `<html>` has no `lang`
    pub missing_document_language: u32,
    /// 1 when the document has no title
    pub missing_page_title: u32,
    /// Ids used more than once
    pub duplicate_ids: u32,
    /// Sum of the rule counts
    pub total_violations: u32,
}

impl From<AuditCounts> for AccessibilityScan {
    fn from(counts: AuditCounts) -> Self {
        let total_violations = counts.missing_image_alt
            + counts.unlabeled_form_controls
            + counts.empty_links
            + counts.empty_buttons
            + counts.missing_document_language
            + counts.missing_page_title
            + counts.duplicate_ids;
        Self {
            missing_image_alt: counts.missing_image_alt,
            unlabeled_form_controls: counts.unlabeled_form_controls,
            empty_links: counts.empty_links,
            empty_buttons: counts.empty_buttons,
            missing_document_language: counts.missing_document_language,
            missing_page_title: counts.missing_page_title,
            duplicate_ids: counts.duplicate_ids,
            total_violations,
        }
    }
}

/// Load the target and audit it.
pub async fn scan(
    browser: &dyn BrowserInstance,
    target: &ScanTarget,
) -> Result<AccessibilityScan> {
    let page = browser.open_page().await?;
    let result = inspect(page.as_ref(), target).await;
    close_quietly(page).await;
    result
}

async fn inspect(page: &dyn PageSession, target: &ScanTarget) -> Result<AccessibilityScan> {
    page.navigate(target.as_str(), WaitPolicy::Load).await?;
    let value = page.evaluate(AUDIT_SCRIPT).await?;
    let counts: AuditCounts = serde_json::from_value(value)
        .map_err(|e| ScanError::Other(format!("unexpected audit result: {e}")))?;
    Ok(counts.into())
}
