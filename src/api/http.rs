//! HTTP control-plane client.
//!
//! Calls are `POST {base}/{facade}/{request}` with a JSON body and a bearer
//! token. Responses are `{"result": ..., "error": {"code", "message"}}`
//! envelopes. Only rate-limited requests are retried, since the server did
//! not act on them.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, trace};

use crate::charm::CharmUrl;
use crate::error::{ControlPlaneError, ControlPlaneResult};

use super::client::ControlPlaneClient;
use super::types::{
    AddMachineArgs, AddUnitArgs, EntityType, MachineInfo, ServiceDeployArgs, UnitInfo,
};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for rate-limited requests.
const MAX_RETRIES: u32 = 3;

/// Base delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Error code for entities that already exist.
const CODE_ALREADY_EXISTS: &str = "already exists";

/// Error code for missing entities.
const CODE_NOT_FOUND: &str = "not found";

/// Error code for rejected credentials.
const CODE_UNAUTHORIZED: &str = "unauthorized access";

/// Control-plane client speaking the JSON-over-HTTP API.
#[derive(Debug, Clone)]
pub struct HttpControlPlaneClient {
    /// HTTP client.
    client: Client,
    /// API base URL, without trailing slash.
    base_url: String,
    /// Bearer token.
    token: String,
    /// Base delay between retries.
    retry_delay: Duration,
}

/// Response envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: Option<T>,
    error: Option<ApiErrorBody>,
}

/// Error part of a response envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    message: String,
}

impl HttpControlPlaneClient {
    /// Creates a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str) -> ControlPlaneResult<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, token: &str, timeout_secs: u64) -> ControlPlaneResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ControlPlaneError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        })
    }

    /// Sets the base delay between retries of rate-limited requests.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Calls a facade method, retrying while rate limited.
    async fn call<T: DeserializeOwned>(
        &self,
        facade: &str,
        request: &str,
        params: &impl Serialize,
    ) -> ControlPlaneResult<Option<T>> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {facade}.{request}");
                tokio::time::sleep(self.retry_delay * attempt).await;
            }

            match self.call_once::<T>(facade, request, params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ControlPlaneError::network("Max retries exceeded")))
    }

    /// Calls a facade method that must return a result.
    async fn call_value<T: DeserializeOwned>(
        &self,
        facade: &str,
        request: &str,
        params: &impl Serialize,
    ) -> ControlPlaneResult<T> {
        self.call(facade, request, params)
            .await?
            .ok_or_else(|| ControlPlaneError::InvalidResponse {
                message: format!("No result in {facade}.{request} response"),
            })
    }

    /// Calls a facade method whose result is ignored.
    async fn call_unit(
        &self,
        facade: &str,
        request: &str,
        params: &impl Serialize,
    ) -> ControlPlaneResult<()> {
        self.call::<IgnoredAny>(facade, request, params).await?;
        Ok(())
    }

    /// Sends a single request.
    async fn call_once<T: DeserializeOwned>(
        &self,
        facade: &str,
        request: &str,
        params: &impl Serialize,
    ) -> ControlPlaneResult<Option<T>> {
        let url = format!("{}/{facade}/{request}", self.base_url);
        trace!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ControlPlaneError::Timeout {
                        operation: format!("{facade}.{request}"),
                    }
                } else {
                    ControlPlaneError::network(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();

            return Err(ControlPlaneError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ControlPlaneError::Unauthorized {
                message: String::from("Invalid API token"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ControlPlaneError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<Envelope<IgnoredAny>>(&body) {
                Ok(Envelope {
                    error: Some(error), ..
                }) => map_error(status.as_u16(), error),
                _ => ControlPlaneError::api_error(status.as_u16(), None, body),
            });
        }

        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| ControlPlaneError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })?;

        if let Some(error) = envelope.error {
            return Err(map_error(status.as_u16(), error));
        }

        Ok(envelope.result)
    }
}

/// Maps an API error body to a control-plane error.
fn map_error(status: u16, error: ApiErrorBody) -> ControlPlaneError {
    match error.code.as_str() {
        CODE_UNAUTHORIZED => ControlPlaneError::Unauthorized {
            message: error.message,
        },
        CODE_NOT_FOUND => ControlPlaneError::NotFound {
            entity: error.message,
        },
        "" => ControlPlaneError::api_error(status, None, error.message),
        code => ControlPlaneError::api_error(status, Some(code.to_string()), error.message),
    }
}

/// Returns true if the error carries the "already exists" code.
fn is_already_exists(error: &ControlPlaneError) -> bool {
    matches!(
        error,
        ControlPlaneError::ApiRequestFailed { code: Some(code), .. } if code == CODE_ALREADY_EXISTS
    )
}

#[async_trait]
impl ControlPlaneClient for HttpControlPlaneClient {
    async fn add_charm(&self, url: &CharmUrl) -> ControlPlaneResult<CharmUrl> {
        #[derive(Deserialize)]
        struct Response {
            url: CharmUrl,
        }

        let params = serde_json::json!({ "url": url.to_string() });
        let response: Response = self.call_value("Charms", "AddCharm", &params).await?;
        Ok(response.url)
    }

    async fn deploy_service(&self, args: &ServiceDeployArgs) -> ControlPlaneResult<()> {
        self.call_unit("Service", "Deploy", args)
            .await
            .map_err(|e| {
                if is_already_exists(&e) {
                    ControlPlaneError::ServiceAlreadyExists {
                        service: args.service_name.clone(),
                    }
                } else {
                    e
                }
            })
    }

    async fn service_charm_url(&self, service: &str) -> ControlPlaneResult<CharmUrl> {
        #[derive(Deserialize)]
        struct Response {
            url: CharmUrl,
        }

        let params = serde_json::json!({ "serviceName": service });
        let response: Response = self.call_value("Service", "GetCharmURL", &params).await?;
        Ok(response.url)
    }

    async fn set_service_charm(
        &self,
        service: &str,
        url: &CharmUrl,
        force_units: bool,
    ) -> ControlPlaneResult<()> {
        let params = serde_json::json!({
            "serviceName": service,
            "charmUrl": url.to_string(),
            "forceUnits": force_units,
        });
        self.call_unit("Service", "SetCharm", &params).await
    }

    async fn set_service_config(&self, service: &str, config_yaml: &str) -> ControlPlaneResult<()> {
        let params = serde_json::json!({
            "serviceName": service,
            "configYaml": config_yaml,
        });
        self.call_unit("Service", "SetYAML", &params).await
    }

    async fn add_relation(&self, endpoint1: &str, endpoint2: &str) -> ControlPlaneResult<()> {
        let params = serde_json::json!({ "endpoints": [endpoint1, endpoint2] });
        self.call_unit("Service", "AddRelation", &params)
            .await
            .map_err(|e| {
                if is_already_exists(&e) {
                    ControlPlaneError::RelationAlreadyExists {
                        endpoint1: endpoint1.to_string(),
                        endpoint2: endpoint2.to_string(),
                    }
                } else {
                    e
                }
            })
    }

    async fn add_machine(&self, args: &AddMachineArgs) -> ControlPlaneResult<String> {
        #[derive(Deserialize)]
        struct Response {
            machine: String,
        }

        let response: Response = self.call_value("Machine", "AddMachine", args).await?;
        Ok(response.machine)
    }

    async fn list_machines(&self) -> ControlPlaneResult<Vec<MachineInfo>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            machines: Vec<MachineInfo>,
        }

        let response: Response = self
            .call_value("Machine", "List", &serde_json::json!({}))
            .await?;
        Ok(response.machines)
    }

    async fn add_unit(&self, args: &AddUnitArgs) -> ControlPlaneResult<String> {
        #[derive(Deserialize)]
        struct Response {
            unit: String,
        }

        let response: Response = self.call_value("Service", "AddUnit", args).await?;
        Ok(response.unit)
    }

    async fn service_units(&self, service: &str) -> ControlPlaneResult<Vec<UnitInfo>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            units: Vec<UnitInfo>,
        }

        let params = serde_json::json!({ "serviceName": service });
        let response: Response = self.call_value("Service", "Units", &params).await?;
        Ok(response.units)
    }

    async fn set_annotations(
        &self,
        entity: EntityType,
        id: &str,
        annotations: &BTreeMap<String, String>,
    ) -> ControlPlaneResult<()> {
        let params = serde_json::json!({
            "tag": entity.tag(id),
            "annotations": annotations,
        });
        self.call_unit("Annotations", "Set", &params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = HttpControlPlaneClient::new("http://localhost:17070/api/", "token").unwrap();
        assert_eq!(client.base_url, "http://localhost:17070/api");
    }

    #[test]
    fn test_map_error_codes() {
        let error = |code: &str| ApiErrorBody {
            code: code.to_string(),
            message: String::from("boom"),
        };

        assert!(matches!(
            map_error(200, error(CODE_UNAUTHORIZED)),
            ControlPlaneError::Unauthorized { .. }
        ));
        assert!(matches!(
            map_error(200, error(CODE_NOT_FOUND)),
            ControlPlaneError::NotFound { .. }
        ));
        assert!(is_already_exists(&map_error(200, error(CODE_ALREADY_EXISTS))));
        assert!(matches!(
            map_error(500, error("")),
            ControlPlaneError::ApiRequestFailed { status: 500, code: None, .. }
        ));
    }
}
