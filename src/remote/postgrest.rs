//! PostgREST (Supabase REST) executor using `reqwest`.

use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::remote::traits::{Filter, RemoteExecutor};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const REST_PREFIX: &str = "rest/v1/";

/// Supabase REST client.
pub struct PostgrestClient {
    http: Client,
    base: Url,
    service_key: String,
}

impl PostgrestClient {
    /// Create a client for the project at `config.url`.
    pub fn new(config: &RemoteConfig) -> RemoteResult<Self> {
        let base = rest_base(&config.url)?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        debug!("PostgREST endpoint: {}", base);

        Ok(Self {
            http,
            base,
            service_key: config.service_key.clone(),
        })
    }

    fn procedure_url(&self, procedure: &str) -> RemoteResult<Url> {
        self.base
            .join(&format!("rpc/{}", procedure))
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    /// Build the read URL for a table and the schema profile it needs, if any.
    fn table_url(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> RemoteResult<(Url, Option<String>)> {
        let (schema, name) = match table.split_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name),
            None => (None, table),
        };

        let mut url = self
            .base
            .join(name)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            let select = if columns.is_empty() {
                "*".to_string()
            } else {
                columns.join(",")
            };
            query.append_pair("select", &select);
            for filter in filters {
                match filter {
                    Filter::Eq(column, value) => {
                        query.append_pair(column, &format!("eq.{}", value));
                    }
                    Filter::NotNull(column) => {
                        query.append_pair(column, "not.is.null");
                    }
                }
            }
        }

        Ok((url, schema))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn read_response(response: Response) -> RemoteResult<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Remote request failed")
                    .to_string()
            });
            warn!(status = status.as_u16(), "Remote call failed: {}", message);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| RemoteError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl RemoteExecutor for PostgrestClient {
    fn name(&self) -> &'static str {
        "postgrest"
    }

    #[instrument(skip(self, args))]
    async fn call_procedure(&self, procedure: &str, args: Value) -> RemoteResult<Value> {
        let url = self.procedure_url(procedure)?;
        let response = self
            .authorize(self.http.post(url))
            .json(&args)
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Self::read_response(response).await
    }

    #[instrument(skip(self, columns, filters))]
    async fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[Filter],
    ) -> RemoteResult<Value> {
        let (url, schema) = self.table_url(table, columns, filters)?;
        let mut request = self.authorize(self.http.get(url));
        if let Some(schema) = schema {
            request = request.header("Accept-Profile", schema);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Self::read_response(response).await
    }
}

/// Normalize a project URL into the REST root, always ending in `/`.
fn rest_base(project_url: &str) -> RemoteResult<Url> {
    let trimmed = project_url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let url = Url::parse(&with_slash).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RemoteError::InvalidUrl(format!(
            "Unsupported scheme: {}",
            url.scheme()
        )));
    }

    url.join(REST_PREFIX)
        .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
}

/// Extract the PostgREST `message` field from an error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            value
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
}
