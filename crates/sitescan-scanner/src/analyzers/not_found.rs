//! Checks that a nonexistent path answers 404.

use crate::error::Result;
use crate::target::ScanTarget;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Result of the not-found probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundScan {
    /// A random path answered 404 after redirects
    pub target_url_404_test: bool,
}

/// Request a random path on the target and check for a 404.
pub async fn scan(client: &reqwest::Client, target: &ScanTarget) -> Result<NotFoundScan> {
    let probe = target.with_path(&format!("/{}", uuid::Uuid::new_v4()));
    tracing::trace!("Probing {} for a 404", probe);
    let response = client.get(probe).send().await?;
    Ok(NotFoundScan {
        target_url_404_test: response.status() == StatusCode::NOT_FOUND,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn target_for(server: &MockServer) -> ScanTarget {
        let url = url::Url::parse(&server.uri()).expect("mock server uri");
        ScanTarget::from_url(&server.uri(), url).expect("target")
    }

    #[tokio::test]
    async fn test_missing_page_is_404() {
        let server = MockServer::start().await;
        let client = reqwest::Client::new();

        let result = scan(&client, &target_for(&server).await)
            .await
            .expect("scan");
        assert!(result.target_url_404_test);
    }

    #[tokio::test]
    async fn test_soft_404_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Page not found"))
            .mount(&server)
            .await;
        let client = reqwest::Client::new();

        let result = scan(&client, &target_for(&server).await)
            .await
            .expect("scan");
        assert!(!result.target_url_404_test);
    }
}
