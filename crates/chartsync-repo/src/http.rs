//! Index retrieval over HTTP(S)

use tokio_util::sync::CancellationToken;

use crate::config::RepositoryConfig;
use crate::error::{RepoError, Result};
use crate::index::{ChartVersions, parse_index};

/// Fetches repository index documents with a prepared client
#[derive(Debug, Clone)]
pub struct IndexFetcher {
    client: reqwest::Client,
}

impl IndexFetcher {
    /// Wrap a client built by [`SecureClientBuilder`](crate::SecureClientBuilder)
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET the index document and return its raw bytes
    ///
    /// A single attempt is made; anything but a 2xx response is an error.
    pub async fn fetch(&self, index_url: &str, cancel: &CancellationToken) -> Result<Vec<u8>> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RepoError::Cancelled),
            result = self.fetch_inner(index_url) => result,
        }
    }

    async fn fetch_inner(&self, index_url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url = %index_url, "Fetching repository index");

        let response = self
            .client
            .get(index_url)
            .send()
            .await
            .map_err(|e| RepoError::fetch(index_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RepoError::Fetch {
                url: index_url.to_string(),
                status: Some(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RepoError::fetch(index_url, e))?;

        tracing::debug!(url = %index_url, bytes = body.len(), "Fetched repository index");
        Ok(body.to_vec())
    }

    /// Fetch and parse the index of a repository
    pub async fn fetch_charts(
        &self,
        repo: &RepositoryConfig,
        cancel: &CancellationToken,
    ) -> Result<ChartVersions> {
        let index_url = repo.index_url()?;
        let bytes = self.fetch(&index_url, cancel).await?;
        parse_index(&bytes, &index_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SecureClientBuilder, TrustMaterial};
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INDEX: &str = r#"
apiVersion: v1
entries:
  nginx:
    - name: nginx
      version: 1.0.0
      urls:
        - charts/nginx-1.0.0.tgz
"#;

    fn fetcher() -> IndexFetcher {
        IndexFetcher::new(reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stable/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/stable/index.yaml", server.uri());
        let body = fetcher().fetch(&url, &CancellationToken::new()).await.unwrap();
        assert_eq!(body, INDEX.as_bytes());
    }

    #[tokio::test]
    async fn test_fetch_charts_resolves_against_index_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stable/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(INDEX))
            .mount(&server)
            .await;

        let repo = RepositoryConfig::new("stable", format!("{}/stable/", server.uri()));
        let charts = fetcher()
            .fetch_charts(&repo, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            charts["nginx"][0].download_urls(),
            [format!("{}/stable/charts/nginx-1.0.0.tgz", server.uri())]
        );
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/index.yaml", server.uri());
        let err = fetcher()
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            RepoError::Fetch { status, .. } => assert_eq!(status, Some(404)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Port 1 is never listening
        let err = fetcher()
            .fetch("http://127.0.0.1:1/index.yaml", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Fetch { status: None, .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(INDEX)
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = SecureClientBuilder::new()
            .timeout(Duration::from_millis(200))
            .build(TrustMaterial::platform())
            .unwrap();

        let url = format!("{}/index.yaml", server.uri());
        let started = Instant::now();
        let err = IndexFetcher::new(client)
            .fetch(&url, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        match err {
            RepoError::Fetch { status, message, .. } => {
                assert_eq!(status, None);
                assert_eq!(message, "request timed out");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(INDEX)
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let url = format!("{}/index.yaml", server.uri());
        let err = fetcher().fetch(&url, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
