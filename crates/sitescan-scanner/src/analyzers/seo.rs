//! SEO metadata extracted from the rendered home page.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// SEO metadata of the final URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoScan {
    /// `<title>` text
    pub title_final_url: Option<String>,
    /// `<meta name="description">` content
    pub description_final_url: Option<String>,
    /// A `<main>` element exists
    pub main_element_final_url: bool,
    /// `<link rel="canonical">` href
    pub canonical_link_final_url: Option<String>,
    /// `og:title`
    pub og_title_final_url: Option<String>,
    /// `og:description`
    pub og_description_final_url: Option<String>,
    /// `article:published_time`
    pub og_article_published_final_url: Option<String>,
    /// `article:modified_time`
    pub og_article_modified_final_url: Option<String>,
}

struct Selectors {
    title: Selector,
    main: Selector,
    canonical: Selector,
    meta: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| Selectors {
        title: Selector::parse("title").expect("valid selector"),
        main: Selector::parse("main").expect("valid selector"),
        canonical: Selector::parse("link[rel]").expect("valid selector"),
        meta: Selector::parse("meta[content]").expect("valid selector"),
    })
}

/// Extract SEO metadata from a rendered document.
#[must_use]
pub fn scan(dom: &str) -> SeoScan {
    let document = Html::parse_document(dom);
    let sel = selectors();

    let title_final_url = document
        .select(&sel.title)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let canonical_link_final_url = document
        .select(&sel.canonical)
        .find(|el| {
            el.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("canonical")))
        })
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string);

    let meta = |key: &str| -> Option<String> {
        document
            .select(&sel.meta)
            .find(|el| {
                let v = el.value();
                v.attr("property")
                    .or_else(|| v.attr("name"))
                    .is_some_and(|name| name.eq_ignore_ascii_case(key))
            })
            .and_then(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
    };

    SeoScan {
        title_final_url,
        description_final_url: meta("description"),
        main_element_final_url: document.select(&sel.main).next().is_some(),
        canonical_link_final_url,
        og_title_final_url: meta("og:title"),
        og_description_final_url: meta("og:description"),
        og_article_published_final_url: meta("article:published_time"),
        og_article_modified_final_url: meta("article:modified_time"),
    }
}
