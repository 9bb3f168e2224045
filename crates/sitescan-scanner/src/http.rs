//! Plain HTTP client for analyzers that do not need a browser.

use crate::error::Result;
use std::time::Duration;

const MAX_REDIRECTS: usize = 10;

/// Build the shared HTTP client: bounded redirects, per-request timeout,
/// scanner user agent.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        assert!(build_client("sitescan-test", Duration::from_secs(5)).is_ok());
    }
}
