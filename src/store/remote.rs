//! Remote tree store over its REST protocol.
//!
//! Every node of the tree is addressable as `{base}/{path}.json`. Reads are
//! `GET`, pushes are `POST` (the reply names the generated key), partial
//! updates are `PATCH`, conditional writes are `PUT` guarded by `if-match`,
//! and deletes are `DELETE`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{TreeStore, Versioned};
use crate::errors::AppError;

/// Header asking the tree to return the content tag with a read.
pub const ETAG_REQUEST_HEADER: &str = "X-Firebase-ETag";

/// Reply to a push.
#[derive(Debug, Deserialize)]
struct PushReply {
    name: String,
}

/// Remote tree client. Cheap to clone; the HTTP connection pool is shared.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    auth: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, auth: Option<String>, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// URL of the node at `path`.
    pub fn node_url(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/.json", self.base_url)
        } else {
            format!("{}/{}.json", self.base_url, path)
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.node_url(path));
        match &self.auth {
            Some(token) => builder.query(&[("auth", token.as_str())]),
            None => builder,
        }
    }
}

/// Turn a non-success reply into `AppError::Store`.
async fn check(method: &Method, path: &str, response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%method, path, %status, body = %body, "store request rejected");
    Err(AppError::Store(format!(
        "{} {} failed with {}: {}",
        method, path, status, body
    )))
}

fn etag_header(response: &Response) -> Result<String, AppError> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| AppError::Store("Store reply is missing the ETag header".to_string()))
}

#[async_trait]
impl TreeStore for RestStore {
    async fn get(&self, path: &str) -> Result<Value, AppError> {
        tracing::debug!(path, "GET");
        let response = self.request(Method::GET, path).send().await?;
        let response = check(&Method::GET, path, response).await?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_versioned(&self, path: &str) -> Result<Versioned, AppError> {
        tracing::debug!(path, "GET with etag");
        let response = self
            .request(Method::GET, path)
            .header(ETAG_REQUEST_HEADER, "true")
            .send()
            .await?;
        let response = check(&Method::GET, path, response).await?;
        let etag = etag_header(&response)?;
        let value = response.json::<Value>().await?;
        Ok(Versioned { value, etag })
    }

    async fn push(&self, path: &str, value: &Value) -> Result<String, AppError> {
        tracing::debug!(path, "POST");
        let response = self.request(Method::POST, path).json(value).send().await?;
        let response = check(&Method::POST, path, response).await?;
        let reply = response.json::<PushReply>().await?;
        Ok(reply.name)
    }

    async fn update(&self, path: &str, fields: &Map<String, Value>) -> Result<(), AppError> {
        if fields.is_empty() {
            return Ok(());
        }
        tracing::debug!(path, fields = fields.len(), "PATCH");
        let response = self
            .request(Method::PATCH, path)
            .json(fields)
            .send()
            .await?;
        check(&Method::PATCH, path, response).await?;
        Ok(())
    }

    async fn set_if_match(
        &self,
        path: &str,
        value: &Value,
        etag: &str,
    ) -> Result<bool, AppError> {
        tracing::debug!(path, etag, "PUT if-match");
        let response = self
            .request(Method::PUT, path)
            .header(header::IF_MATCH, etag)
            .json(value)
            .send()
            .await?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(false);
        }
        check(&Method::PUT, path, response).await?;
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        tracing::debug!(path, "DELETE");
        let response = self.request(Method::DELETE, path).send().await?;
        check(&Method::DELETE, path, response).await?;
        Ok(())
    }
}
