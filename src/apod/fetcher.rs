use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, Result};

const MAX_ERROR_BODY: usize = 200;

/// Client for the Astronomy Picture of the Day endpoint.
pub struct ApodFetcher {
    client: Client,
    api_url: String,
    api_key: String,
}

impl std::fmt::Debug for ApodFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApodFetcher")
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .finish()
    }
}

impl ApodFetcher {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent("apod-etl/1.0")
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// One GET against the API. Without a date the API serves today's entry.
    /// Retrying is left to the caller.
    pub async fn fetch(&self, date: Option<NaiveDate>) -> Result<Value> {
        let mut query = vec![("api_key", self.api_key.clone())];
        if let Some(date) = date {
            query.push(("date", date.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::HttpStatus {
                code: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY).to_string(),
            });
        }

        tracing::debug!("APOD response: {}", body);

        Ok(serde_json::from_str(&body)?)
    }
}

/// Truncates a string to the given maximum length at a char boundary.
fn truncate(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer) -> ApodFetcher {
        ApodFetcher::new(
            &format!("{}/planetary/apod", server.uri()),
            "test-key",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_key_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .and(query_param("api_key", "test-key"))
            .and(query_param("date", "2024-01-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "A",
                "date": "2024-01-01"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let body = fetcher_for(&server)
            .fetch(NaiveDate::from_ymd_opt(2024, 1, 1))
            .await
            .unwrap();

        assert_eq!(body["title"], "A");
    }

    #[tokio::test]
    async fn omits_date_when_not_given() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/planetary/apod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"title": "today"})))
            .mount(&server)
            .await;

        fetcher_for(&server).fetch(None).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.query_pairs().all(|(k, _)| k != "date"));
    }

    #[tokio::test]
    async fn server_error_is_retryable_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch(None).await.unwrap_err();

        assert!(matches!(err, AppError::HttpStatus { code: 500, ref body } if body == "upstream down"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn forbidden_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch(None).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = fetcher_for(&server).fetch(None).await.unwrap_err();
        assert!(matches!(err, AppError::Json(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let fetcher = ApodFetcher::new(
            "http://127.0.0.1:9/planetary/apod",
            "test-key",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = fetcher.fetch(None).await.unwrap_err();
        assert!(matches!(err, AppError::Http(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn debug_hides_api_key() {
        let fetcher = ApodFetcher::new("http://localhost/apod", "secret", Duration::from_secs(1)).unwrap();
        let shown = format!("{:?}", fetcher);
        assert!(!shown.contains("secret"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }
}
