use crate::models::{Health, LogEntry, LogStats};
use color_eyre::{eyre::eyre, Result};
use reqwest::{header, Client, StatusCode, Url};
use serde::Serialize;
use std::time::Duration;

/// User agent sent with every request and embedded in test logs.
pub const CLIENT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for the log API and the geolocation providers.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(CLIENT_USER_AGENT)
        .default_headers(headers)
        .build()?)
}

#[derive(Serialize)]
struct NewLog<'a> {
    message: &'a str,
    level: &'a str,
}

/// Client for the log backend.
pub struct LogApi {
    client: Client,
    base_url: Url,
}

impl LogApi {
    pub fn new(client: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// All entries, newest first.
    pub async fn fetch_logs(&self) -> Result<Vec<LogEntry>> {
        let logs = self
            .client
            .get(self.endpoint("/api/logs")?)
            .header(header::CACHE_CONTROL, "no-store")
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<LogEntry>>()
            .await?;
        Ok(logs)
    }

    pub async fn post_log(&self, message: &str, level: &str) -> Result<()> {
        let res = self
            .client
            .post(self.endpoint("/api/logs")?)
            .json(&NewLog { message, level })
            .send()
            .await?;

        match res.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            status => Err(eyre!("log API rejected new entry with status {}", status)),
        }
    }

    pub async fn clear_logs(&self) -> Result<()> {
        self.client
            .delete(self.endpoint("/api/logs/clear")?)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<LogStats> {
        let stats = self
            .client
            .get(self.endpoint("/api/stats")?)
            .send()
            .await?
            .error_for_status()?
            .json::<LogStats>()
            .await?;
        Ok(stats)
    }

    pub async fn health(&self) -> Result<Health> {
        let health = self
            .client
            .get(self.endpoint("/api/health")?)
            .send()
            .await?
            .error_for_status()?
            .json::<Health>()
            .await?;
        Ok(health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn api_for(server: &MockServer) -> LogApi {
        LogApi::new(build_http_client(Duration::from_secs(5)).unwrap(), &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn fetches_logs_in_server_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 2, "message": "second", "level": "WARN", "ip": "8.8.8.8",
                  "geo": "Inconnue", "created_at": "2025-03-04T09:05:08" },
                { "id": 1, "message": "first", "level": "INFO", "ip": null,
                  "geo": "Inconnue", "created_at": "2025-03-04T09:05:07" }
            ])))
            .mount(&server)
            .await;

        let logs = api_for(&server).await.fetch_logs().await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].id, 2);
        assert_eq!(logs[1].ip, None);
    }

    #[tokio::test]
    async fn posts_message_and_level() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/logs"))
            .and(body_json(json!({ "message": "hello", "level": "INFO" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "status": "success" })))
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server).await.post_log("hello", "INFO").await.unwrap();
    }

    #[tokio::test]
    async fn clear_uses_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/logs/clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "logs cleared" })))
            .expect(1)
            .mount(&server)
            .await;

        api_for(&server).await.clear_logs().await.unwrap();
    }

    #[tokio::test]
    async fn stats_and_health_are_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "log_count": 7 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok", "backend": "up", "db": true, "version": "1.0"
            })))
            .mount(&server)
            .await;

        let api = api_for(&server).await;
        assert_eq!(api.stats().await.unwrap().log_count, 7);
        let health = api.health().await.unwrap();
        assert!(health.db);
        assert_eq!(health.backend, "up");
    }

    #[tokio::test]
    async fn server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/logs"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert!(api_for(&server).await.fetch_logs().await.is_err());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let client = build_http_client(Duration::from_secs(1)).unwrap();
        assert!(LogApi::new(client, "not a url").is_err());
    }
}
