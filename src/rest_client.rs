use crate::{
    backend::DocumentStore,
    error::{Result, ScheduleError},
};
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `DocumentStore` over a hosted JSON-document REST API, where the document
/// at `/a/b` lives at `{base_url}/a/b.json`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostResponse {
    name: String,
}

impl RestClient {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            auth_token: auth_token.filter(|token| !token.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_matches('/');
        let url_string = format!("{}/{path}.json", self.base_url);
        let mut url = Url::parse(&url_string)
            .map_err(|err| ScheduleError::Transport(format!("invalid url {url_string}: {err}")))?;
        if let Some(token) = &self.auth_token {
            url.query_pairs_mut().append_pair("auth", token);
        }
        Ok(url)
    }

    async fn send(&self, method: &str, path: &str, request: RequestBuilder) -> Result<Response> {
        debug!(method, path, "Remote store request");
        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                error!(?err, method, path, "Remote store unreachable");
                ScheduleError::from(err)
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(%status, method, path, body = %body, "Remote store rejected request");
            Err(ScheduleError::Transport(format!(
                "{method} {path} failed ({status}): {body}"
            )))
        }
    }
}

#[async_trait]
impl DocumentStore for RestClient {
    async fn get(&self, path: &str) -> Result<Value> {
        let request = self.http.get(self.url(path)?);
        let response = self.send("GET", path, request).await?;
        response
            .json::<Value>()
            .await
            .map_err(|err| ScheduleError::Decode(err.to_string()))
    }

    async fn put(&self, path: &str, body: Value) -> Result<()> {
        let request = self.http.put(self.url(path)?).json(&body);
        self.send("PUT", path, request).await?;
        Ok(())
    }

    async fn patch(&self, path: &str, body: Value) -> Result<()> {
        let request = self.http.patch(self.url(path)?).json(&body);
        self.send("PATCH", path, request).await?;
        Ok(())
    }

    async fn post(&self, path: &str, body: Value) -> Result<String> {
        let request = self.http.post(self.url(path)?).json(&body);
        let response = self.send("POST", path, request).await?;
        let created: PostResponse = response
            .json()
            .await
            .map_err(|err| ScheduleError::Decode(err.to_string()))?;
        Ok(created.name)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let request = self.http.delete(self.url(path)?);
        self.send("DELETE", path, request).await?;
        Ok(())
    }
}

fn normalize_base_url(endpoint: &str) -> Result<String> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(ScheduleError::Validation(
            "backend url must not be empty".into(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
