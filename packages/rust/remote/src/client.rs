//! HTTP client for the PokeAPI resource service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use pokefetch_shared::{PokefetchError, RawRecord, RemoteConfig, Result};

use crate::RemoteClient;

/// User-Agent string for remote requests.
const USER_AGENT: &str = concat!("pokefetch/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct EffectEntry {
    effect: String,
}

/// A secondary resource (an ability) as the remote service returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct SubResource {
    #[serde(default)]
    effect_entries: Vec<EffectEntry>,
}

impl SubResource {
    /// Every effect description, in source order.
    pub fn into_descriptions(self) -> Vec<String> {
        self.effect_entries.into_iter().map(|e| e.effect).collect()
    }
}

// ---------------------------------------------------------------------------
// PokeApiClient
// ---------------------------------------------------------------------------

/// Single-attempt client for primary (`pokemon/{id}`) and secondary
/// (ability URI) lookups.
#[derive(Debug, Clone)]
pub struct PokeApiClient {
    client: Client,
    base_url: Url,
}

impl PokeApiClient {
    /// Build a client from the `[remote]` config section.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base).map_err(|e| {
            PokefetchError::config(format!("invalid base URL '{}': {e}", config.base_url))
        })?;

        Self::with_base_url(base_url, config.timeout())
    }

    /// Build a client against an explicit base URL.
    pub fn with_base_url(base_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .map_err(|e| PokefetchError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a reference URI; relative ones are joined onto the base URL.
    fn resolve(&self, uri: &str) -> std::result::Result<Url, url::ParseError> {
        match Url::parse(uri) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.base_url.join(uri),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RemoteClient for PokeApiClient {
    #[instrument(skip(self))]
    async fn fetch_primary(&self, id: i64) -> Result<RawRecord> {
        let url = self
            .base_url
            .join(&format!("pokemon/{id}"))
            .map_err(|e| PokefetchError::upstream_id(id, e.to_string()))?;

        debug!(%url, "fetching primary record");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PokefetchError::upstream_id(id, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PokefetchError::upstream_id(id, format!("HTTP {status}")));
        }

        response
            .json::<RawRecord>()
            .await
            .map_err(|e| PokefetchError::upstream_id(id, format!("body decode failed: {e}")))
    }

    #[instrument(skip(self))]
    async fn fetch_secondary(&self, uri: &str) -> Result<Vec<String>> {
        let url = self
            .resolve(uri)
            .map_err(|e| PokefetchError::upstream_uri(uri, e.to_string()))?;

        debug!(%url, "fetching sub-resource");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PokefetchError::upstream_uri(uri, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PokefetchError::upstream_uri(uri, format!("HTTP {status}")));
        }

        let resource = response
            .json::<SubResource>()
            .await
            .map_err(|e| PokefetchError::upstream_uri(uri, format!("body decode failed: {e}")))?;

        Ok(resource.into_descriptions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pokefetch_shared::LookupTarget;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> PokeApiClient {
        let base = Url::parse(&format!("{}/api/v2/", server.uri())).unwrap();
        PokeApiClient::with_base_url(base, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn new_normalizes_trailing_slash() {
        let config = RemoteConfig {
            base_url: "https://pokeapi.co/api/v2".into(),
            timeout_secs: 5,
        };
        let client = PokeApiClient::new(&config).unwrap();
        assert_eq!(client.base_url().as_str(), "https://pokeapi.co/api/v2/");
    }

    #[test]
    fn new_rejects_invalid_base() {
        let config = RemoteConfig {
            base_url: "::not a url".into(),
            timeout_secs: 5,
        };
        assert!(PokeApiClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn fetch_primary_decodes_record() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": 1,
            "name": "bulbasaur",
            "height": 7,
            "weight": 69,
            "abilities": [
                {"ability": {"name": "overgrow", "url": "https://pokeapi.co/api/v2/ability/65/"}},
                {"ability": {"name": "chlorophyll", "url": "https://pokeapi.co/api/v2/ability/34/"}}
            ]
        });

        Mock::given(method("GET"))
            .and(path("/api/v2/pokemon/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let raw = client.fetch_primary(1).await.unwrap();
        assert_eq!(raw.name, "bulbasaur");
        assert_eq!(raw.abilities.len(), 2);
        assert_eq!(raw.abilities[1].ability.name, "chlorophyll");
    }

    #[tokio::test]
    async fn fetch_primary_maps_status_to_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/pokemon/99999"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_primary(99999).await.unwrap_err();
        match err {
            PokefetchError::UpstreamLookup { target, message } => {
                assert_eq!(target, LookupTarget::Id(99999));
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_primary_rejects_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/pokemon/3"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.fetch_primary(3).await.unwrap_err();
        assert!(err.to_string().contains("body decode failed"));
    }

    #[tokio::test]
    async fn fetch_secondary_collects_effects_in_order() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": 65,
            "effect_entries": [
                {"effect": "Strengthens grass moves.", "language": {"name": "en"}},
                {"effect": "Verstärkt Pflanzen-Attacken.", "language": {"name": "de"}}
            ]
        });
        Mock::given(path("/api/v2/ability/65/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let uri = format!("{}/api/v2/ability/65/", server.uri());
        let effects = client.fetch_secondary(&uri).await.unwrap();
        assert_eq!(
            effects,
            vec!["Strengthens grass moves.", "Verstärkt Pflanzen-Attacken."]
        );
    }

    #[tokio::test]
    async fn fetch_secondary_joins_relative_uri() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/ability/34/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 34, "effect_entries": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let effects = client.fetch_secondary("ability/34/").await.unwrap();
        assert!(effects.is_empty());
    }

    #[tokio::test]
    async fn fetch_secondary_failure_carries_uri() {
        let server = MockServer::start().await;
        Mock::given(path("/api/v2/ability/7/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let uri = format!("{}/api/v2/ability/7/", server.uri());
        let err = client.fetch_secondary(&uri).await.unwrap_err();
        match err {
            PokefetchError::UpstreamLookup { target, .. } => {
                assert_eq!(target, LookupTarget::Uri(uri));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
