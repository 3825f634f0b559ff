use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{RegistryConfig, RegistryError, SchemaRegistry};

const CONTENT_TYPE: &str = "application/vnd.schemaregistry.v1+json";

#[derive(Serialize)]
struct RegisterRequest<'a> {
    schema: &'a str,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: u32,
}

#[derive(Deserialize)]
struct SchemaResponse {
    schema: String,
}

/// REST client for a Confluent-compatible schema registry.
pub struct HttpSchemaRegistry {
    http: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpSchemaRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RegistryError::Client(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<String, RegistryError> {
        let resp = self
            .with_auth(req)
            .header(reqwest::header::ACCEPT, CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| RegistryError::Request { url: url.to_string(), detail: e.to_string() })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RegistryError::Request { url: url.to_string(), detail: e.to_string() })?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(RegistryError::Status { url: url.to_string(), status: status.as_u16(), body })
        }
    }
}

impl SchemaRegistry for HttpSchemaRegistry {
    fn register<'a>(
        &'a self,
        subject: &'a str,
        schema: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<u32, RegistryError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/subjects/{subject}/versions", self.base_url);
            let body = serde_json::to_string(&RegisterRequest { schema })
                .map_err(|e| RegistryError::Client(e.to_string()))?;
            let req = self
                .http
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
                .body(body);
            let text = self.send(&url, req).await?;
            let resp: RegisterResponse = serde_json::from_str(&text)
                .map_err(|e| RegistryError::Response { url: url.clone(), detail: e.to_string() })?;
            tracing::debug!(subject, schema_id = resp.id, "schema registered");
            Ok(resp.id)
        })
    }

    fn schema_by_id(
        &self,
        id: u32,
    ) -> Pin<Box<dyn Future<Output = Result<String, RegistryError>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/schemas/ids/{id}", self.base_url);
            let req = self.http.get(&url);
            let text = match self.send(&url, req).await {
                Err(RegistryError::Status { status: 404, .. }) => return Err(RegistryError::NotFound(id)),
                other => other?,
            };
            let resp: SchemaResponse = serde_json::from_str(&text)
                .map_err(|e| RegistryError::Response { url: url.clone(), detail: e.to_string() })?;
            tracing::debug!(schema_id = id, "schema fetched");
            Ok(resp.schema)
        })
    }
}
