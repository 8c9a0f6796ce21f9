// ── Control-plane HTTP client ──
//
// Bearer-authenticated client for the service-definition API. Definitions
// are the control plane's record of who may advertise a service and with
// which tags; they are distinct from local advertisements, which is why
// this client has GET and PUT but deliberately no DELETE.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;

const DEFAULT_BASE_URL: &str = "https://api.tailscale.com";
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// A service definition as the control plane returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub addrs: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ports: Vec<String>,
}

/// Creation payload for `PUT .../services/<svc_id>`.
#[derive(Debug, Serialize)]
struct ServiceCreate<'a> {
    name: &'a str,
    tags: &'a [String],
    ports: &'a [String],
}

/// Client for the control plane's service-definition endpoints.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: Url,
    tailnet: String,
    api_key: SecretString,
}

impl ControlPlaneClient {
    /// Create a client against the public API host.
    pub fn new(tailnet: impl Into<String>, api_key: SecretString) -> Result<Self, Error> {
        Self::with_base_url(Url::parse(DEFAULT_BASE_URL)?, tailnet, api_key)
    }

    /// Create a client against an explicit base URL (tests point this at a
    /// mock server).
    pub fn with_base_url(
        base_url: Url,
        tailnet: impl Into<String>,
        api_key: SecretString,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            tailnet: tailnet.into(),
            api_key,
        })
    }

    /// Fetch a service definition. `None` means the control plane has never
    /// heard of it (HTTP 404).
    pub async fn get_service(&self, service_id: &str) -> Result<Option<ServiceDefinition>, Error> {
        let url = self.service_url(service_id)?;
        debug!(%url, "GET service definition");

        let resp = self
            .http
            .get(url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ControlPlane {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(resp.json().await?))
    }

    /// Create a service definition. The API requires the full name and a
    /// non-empty port list in the payload.
    pub async fn create_service(
        &self,
        service_id: &str,
        tags: &[String],
        ports: &[String],
    ) -> Result<(), Error> {
        let url = self.service_url(service_id)?;
        let payload = ServiceCreate {
            name: service_id,
            tags,
            ports,
        };
        debug!(%url, ?payload, "PUT service definition");

        let resp = self
            .http
            .put(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ControlPlane {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    fn service_url(&self, service_id: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        // path_segments_mut percent-encodes the `svc:` colon for us.
        url.path_segments_mut()
            .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .extend(["api", "v2", "tailnet", self.tailnet.as_str(), "services", service_id]);
        Ok(url)
    }
}
