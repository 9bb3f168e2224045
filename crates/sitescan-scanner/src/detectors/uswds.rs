//! U.S. Web Design System (USWDS) adoption scoring.
//!
//! Every signal is an independent weighted score; `uswds_count` is their sum.
//! The total is a heuristic score, not a count, and has no upper bound.

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const FLAG_BONUS: i64 = 20;
const CSS_MENTION_BONUS: i64 = 20;
const VERSION_BONUS: i64 = 20;
const MERRIWEATHER_BONUS: i64 = 5;
const PUBLIC_SANS_BONUS: i64 = 20;
const SOURCE_SANS_BONUS: i64 = 5;
const TABLE_PENALTY: i64 = -10;
const USA_CLASS_WEIGHT: i64 = 5;

/// USWDS signal scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UswdsScan {
    /// Elements with a `usa-` class, square-root dampened
    pub usa_classes: i64,
    /// Literal `uswds` mentions in the HTML
    pub uswds_string: i64,
    /// Penalty for `<table>` elements
    pub uswds_tables: i64,
    /// `.usa-` references in the HTML
    pub uswds_inline_css: i64,
    /// Flag or favicon asset referenced in the HTML
    pub uswds_us_flag: i64,
    /// A stylesheet mentions USWDS
    pub uswds_string_in_css: i64,
    /// Flag or favicon asset referenced in a stylesheet
    pub uswds_us_flag_in_css: i64,
    /// Merriweather font in a stylesheet
    pub uswds_merriweather_font: i64,
    /// Public Sans font in a stylesheet
    pub uswds_public_sans_font: i64,
    /// Source Sans Pro font in a stylesheet
    pub uswds_source_sans_font: i64,
    /// USWDS version declared by a stylesheet
    pub uswds_semantic_version: Option<String>,
    /// Bonus for a declared version
    pub uswds_version: i64,
    /// Sum of every signal
    pub uswds_count: i64,
}

/// Score a page.
///
/// `html` is the raw response body, `dom` the rendered document and
/// `stylesheets` the bodies of every loaded stylesheet.
#[must_use]
pub fn scan(html: &str, dom: &str, stylesheets: &[String]) -> UswdsScan {
    let uswds_semantic_version = semantic_version(stylesheets);
    let mut result = UswdsScan {
        usa_classes: usa_classes(dom),
        uswds_string: uswds_string(html),
        uswds_tables: uswds_tables(html),
        uswds_inline_css: uswds_inline_css(html),
        uswds_us_flag: us_flag(html),
        uswds_string_in_css: string_in_css(stylesheets),
        uswds_us_flag_in_css: us_flag_in_css(stylesheets),
        uswds_merriweather_font: font_bonus(stylesheets, merriweather_regex(), MERRIWEATHER_BONUS),
        uswds_public_sans_font: font_bonus(stylesheets, public_sans_regex(), PUBLIC_SANS_BONUS),
        uswds_source_sans_font: font_bonus(stylesheets, source_sans_regex(), SOURCE_SANS_BONUS),
        uswds_version: if uswds_semantic_version.is_some() {
            VERSION_BONUS
        } else {
            0
        },
        uswds_semantic_version,
        uswds_count: 0,
    };
    result.uswds_count = result.usa_classes
        + result.uswds_string
        + result.uswds_tables
        + result.uswds_inline_css
        + result.uswds_us_flag
        + result.uswds_string_in_css
        + result.uswds_us_flag_in_css
        + result.uswds_merriweather_font
        + result.uswds_public_sans_font
        + result.uswds_source_sans_font
        + result.uswds_version;
    result
}

fn usa_class_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse(r#"[class^="usa-"]"#).expect("valid selector"))
}

fn flag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"us_flag_small\.png|favicon-57\.png|favicon-192\.png|favicon-72\.png|favicon-144\.png|favicon-114\.png",
        )
        .expect("valid regex")
    })
}

fn merriweather_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[Mm]erriweather").expect("valid regex"))
}

fn public_sans_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[Pp]ublic.[Ss]ans").expect("valid regex"))
}

fn source_sans_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[Ss]ource.[Ss]ans.[Pp]ro").expect("valid regex"))
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)uswds v?([0-9]+(?:\.[0-9]+)*)").expect("valid regex"))
}

fn count_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// `round(sqrt(n)) * 5` over elements whose class attribute starts with `usa-`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn usa_classes(dom: &str) -> i64 {
    let document = Html::parse_document(dom);
    let n = document.select(usa_class_selector()).count();
    if n == 0 {
        return 0;
    }
    ((n as f64).sqrt().round() as i64) * USA_CLASS_WEIGHT
}

/// Occurrences of the literal `uswds`.
#[must_use]
pub fn uswds_string(html: &str) -> i64 {
    count_i64(html.matches("uswds").count())
}

/// `-10` per `<table`.
#[must_use]
pub fn uswds_tables(html: &str) -> i64 {
    count_i64(html.matches("<table").count()) * TABLE_PENALTY
}

/// Occurrences of `.usa-`.
#[must_use]
pub fn uswds_inline_css(html: &str) -> i64 {
    count_i64(html.matches(".usa-").count())
}

/// Bonus when a USWDS flag or favicon asset is referenced.
#[must_use]
pub fn us_flag(html: &str) -> i64 {
    if flag_regex().is_match(html) {
        FLAG_BONUS
    } else {
        0
    }
}

/// Bonus when any stylesheet mentions USWDS, ignoring case.
#[must_use]
pub fn string_in_css(stylesheets: &[String]) -> i64 {
    if stylesheets
        .iter()
        .any(|css| css.to_lowercase().contains("uswds"))
    {
        CSS_MENTION_BONUS
    } else {
        0
    }
}

/// Bonus when any stylesheet references a USWDS flag or favicon asset.
#[must_use]
pub fn us_flag_in_css(stylesheets: &[String]) -> i64 {
    if stylesheets.iter().any(|css| flag_regex().is_match(css)) {
        FLAG_BONUS
    } else {
        0
    }
}

fn font_bonus(stylesheets: &[String], font: &Regex, bonus: i64) -> i64 {
    if stylesheets.iter().any(|css| font.is_match(css)) {
        bonus
    } else {
        0
    }
}

/// First USWDS version found across stylesheets.
///
/// Disagreeing stylesheets are logged; the first value is kept.
#[must_use]
pub fn semantic_version(stylesheets: &[String]) -> Option<String> {
    let mut versions: Vec<String> = Vec::new();
    for css in stylesheets {
        if let Some(version) = version_regex()
            .captures(css)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        {
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
    }
    if versions.len() > 1 {
        tracing::warn!(
            "Stylesheets disagree on USWDS version: {}; keeping {}",
            versions.join(", "),
            versions[0]
        );
    }
    versions.into_iter().next()
}
