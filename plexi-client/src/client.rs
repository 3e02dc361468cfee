//! The Perplexity chat-completion client.

use std::time::Duration;

use futures_util::TryStreamExt;
use tracing::debug;

use crate::auth::{self, ApiKey, CredentialStore};
use crate::catalog::{DEFAULT_MODEL, ModelCatalog};
use crate::error::{Error, Result};
use crate::stream::ReplyStream;
use crate::wire::{ChatRequest, ChatResponse, Message, Role};

/// Well-known Perplexity API base URL.
pub const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai";

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Per-request transport timeout, applied to every underlying call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of the one-token probe that confirms a model is servable.
const PROBE_CONTENT: &str = "ping";

/// Validation strategy applied when a new model is selected.
///
/// Injected at construction, so callers (and tests) can decide how much
/// checking a model switch performs instead of toggling hidden flags.
pub trait ModelPolicy: Send + Sync {
    /// Local admission check against the catalog.
    fn admit(&self, catalog: &ModelCatalog, model: &str) -> Result<()>;

    /// Whether a selection must be confirmed with a live probe request.
    fn probe(&self) -> bool {
        true
    }
}

/// Default policy: the model must be in the catalog and answer a probe.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictPolicy;

impl ModelPolicy for StrictPolicy {
    fn admit(&self, catalog: &ModelCatalog, model: &str) -> Result<()> {
        if catalog.contains(model) {
            Ok(())
        } else {
            Err(Error::ModelNotFound(model.to_string()))
        }
    }
}

/// Catalog-only policy: no live probe. For offline use and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPolicy;

impl ModelPolicy for LocalPolicy {
    fn admit(&self, catalog: &ModelCatalog, model: &str) -> Result<()> {
        StrictPolicy.admit(catalog, model)
    }

    fn probe(&self) -> bool {
        false
    }
}

/// Synchronous-feeling client for the Perplexity chat-completion API.
///
/// Each instance owns its credential, model selection, and transport handle
/// independently; instances never share mutable state. Construction validates
/// the key locally and builds the HTTP client eagerly, but performs no
/// network I/O.
pub struct PerplexityClient {
    key: ApiKey,
    endpoint: String,
    // Conversational role is fixed for the lifetime of the instance.
    role: Role,
    model: String,
    catalog: ModelCatalog,
    policy: Box<dyn ModelPolicy>,
    http: reqwest::Client,
}

impl PerplexityClient {
    /// Create a client against the well-known Perplexity endpoint.
    ///
    /// # Errors
    ///
    /// Fails with `Error::MissingKey` / `Error::InvalidKey` when the key is
    /// empty, lacks the `pplx-` marker, or contains characters outside
    /// printable ASCII. No network call is made.
    pub fn new(key: &str) -> Result<Self> {
        Self::with_endpoint(key, PERPLEXITY_API_URL)
    }

    /// Create a client against a custom endpoint.
    pub fn with_endpoint(key: &str, endpoint: impl Into<String>) -> Result<Self> {
        auth::validate_key(key)?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Request(e.to_string()))?;
        Ok(Self {
            key: ApiKey::new(key),
            endpoint: endpoint.into(),
            role: Role::User,
            model: DEFAULT_MODEL.to_string(),
            catalog: ModelCatalog::builtin(),
            policy: Box::new(StrictPolicy),
            http,
        })
    }

    /// Create a client with the key resolved from the keyring or the
    /// `PERPLEXITY_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        let key = CredentialStore::new(auth::SERVICE_NAME)
            .with_env_fallback()
            .get()?;
        Self::new(key.expose_secret())
    }

    /// Replace the model-selection policy.
    pub fn with_policy(mut self, policy: impl ModelPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The currently selected model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The catalog of selectable models. Pure; stable across calls.
    pub fn models(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Select a new model.
    ///
    /// The name is checked locally first (non-empty, admitted by the policy)
    /// and then, when the policy asks for it, confirmed with a one-token live
    /// completion. The stored selection is only written after every check has
    /// passed, so any failure leaves the previous selection in place.
    ///
    /// # Errors
    ///
    /// `Error::EmptyModel` for an empty name, `Error::ModelNotFound` when the
    /// policy rejects it, `Error::ModelRejected` when the live probe fails.
    pub async fn set_model(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyModel);
        }
        self.policy.admit(&self.catalog, name)?;
        if self.policy.probe() {
            self.probe_model(name).await?;
        }
        debug!(model = name, "model selected");
        self.model = name.to_string();
        Ok(())
    }

    /// Send a query and return the first choice's text.
    ///
    /// # Errors
    ///
    /// `Error::EmptyQuery` before any dispatch for an empty query; transport
    /// failures surface unchanged as `Error::Request` / `Error::Api`.
    pub async fn query(&self, query: &str) -> Result<String> {
        let request = self.build_request(query)?;
        let response = self.dispatch(&request).await?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(Error::EmptyResponse)
    }

    /// Send a query and return the text of every choice the provider
    /// produced for that single request, in provider order.
    pub async fn query_batch(&self, query: &str) -> Result<Vec<String>> {
        let request = self.build_request(query)?;
        let response = self.dispatch(&request).await?;
        if response.choices.is_empty() {
            return Err(Error::EmptyResponse);
        }
        Ok(response
            .choices
            .into_iter()
            .map(|choice| choice.message.content)
            .collect())
    }

    /// Send a query with streaming enabled and return the fragment stream
    /// without consuming any of it.
    pub async fn query_stream(&self, query: &str) -> Result<ReplyStream> {
        let request = self.build_request(query)?.stream();
        let response = self.send(&request).await?;
        let bytes = response
            .bytes_stream()
            .map_err(|e| Error::Request(e.to_string()));
        Ok(ReplyStream::new(bytes))
    }

    fn build_request(&self, query: &str) -> Result<ChatRequest> {
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }
        Ok(ChatRequest::new(
            self.model.as_str(),
            vec![Message::new(self.role, query)],
        ))
    }

    /// One-token completion against `name` to confirm the service accepts it.
    async fn probe_model(&self, name: &str) -> Result<()> {
        let request =
            ChatRequest::new(name, vec![Message::new(self.role, PROBE_CONTENT)]).max_tokens(1);
        match self.dispatch(&request).await {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::ModelRejected {
                model: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn dispatch(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.send(request).await?;
        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::Request(e.to_string()))
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.endpoint, CHAT_COMPLETIONS_PATH);
        debug!(model = %request.model, url = %url, "dispatching chat completion");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "pplx-abc123";
    const TEST_QUERY: &str =
        "Brief answer to the ultimate question about life, the Universe, and everything?";

    #[test]
    fn new_rejects_empty_key() {
        assert!(matches!(PerplexityClient::new(""), Err(Error::MissingKey)));
    }

    #[test]
    fn new_rejects_key_without_prefix() {
        assert!(matches!(
            PerplexityClient::new("bogus"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn new_rejects_key_with_non_ascii() {
        let key = format!("{TEST_KEY}\u{1F60A}");
        assert!(matches!(
            PerplexityClient::new(&key),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn new_starts_on_default_model() {
        let client = PerplexityClient::new(TEST_KEY).unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        assert!(client.models().contains(client.model()));
        assert_eq!(client.endpoint(), PERPLEXITY_API_URL);
    }

    #[test]
    fn with_endpoint_stores_custom_endpoint() {
        let client = PerplexityClient::with_endpoint(TEST_KEY, "http://localhost:8080").unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080");
    }

    #[test]
    fn catalog_is_stable_across_accesses() {
        let client = PerplexityClient::new(TEST_KEY).unwrap();
        let first: Vec<_> = client.models().names().collect();
        let second: Vec<_> = client.models().names().collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn set_model_rejects_empty_name() {
        let mut client = PerplexityClient::new(TEST_KEY).unwrap();
        assert!(matches!(
            client.set_model("").await,
            Err(Error::EmptyModel)
        ));
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn set_model_unknown_model_keeps_selection() {
        let mut client = PerplexityClient::new(TEST_KEY).unwrap();
        let err = client.set_model("bogus-llm-1b").await.unwrap_err();
        assert!(matches!(err, Error::ModelNotFound(name) if name == "bogus-llm-1b"));
        assert_eq!(client.model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn set_model_without_probe_updates_selection() {
        let mut client = PerplexityClient::new(TEST_KEY)
            .unwrap()
            .with_policy(LocalPolicy);
        client.set_model("llama-3.1-70b-instruct").await.unwrap();
        assert_eq!(client.model(), "llama-3.1-70b-instruct");
    }

    #[tokio::test]
    async fn custom_policy_controls_admission() {
        // A policy that admits anything, probe-free: the injected replacement
        // for a hidden test-mode bypass.
        struct AdmitAll;
        impl ModelPolicy for AdmitAll {
            fn admit(&self, _catalog: &ModelCatalog, _model: &str) -> Result<()> {
                Ok(())
            }
            fn probe(&self) -> bool {
                false
            }
        }

        let mut client = PerplexityClient::new(TEST_KEY).unwrap().with_policy(AdmitAll);
        client.set_model("an-uncataloged-model").await.unwrap();
        assert_eq!(client.model(), "an-uncataloged-model");
    }

    #[tokio::test]
    async fn query_rejects_empty_query_before_dispatch() {
        // Unroutable endpoint: reaching the transport would fail loudly,
        // so an EmptyQuery error proves no dispatch happened.
        let client = PerplexityClient::with_endpoint(TEST_KEY, "http://invalid.localdomain").unwrap();
        assert!(matches!(client.query("").await, Err(Error::EmptyQuery)));
    }

    #[tokio::test]
    async fn query_batch_rejects_empty_query_before_dispatch() {
        let client = PerplexityClient::with_endpoint(TEST_KEY, "http://invalid.localdomain").unwrap();
        assert!(matches!(
            client.query_batch("").await,
            Err(Error::EmptyQuery)
        ));
    }

    #[tokio::test]
    async fn query_stream_rejects_empty_query_before_dispatch() {
        let client = PerplexityClient::with_endpoint(TEST_KEY, "http://invalid.localdomain").unwrap();
        assert!(matches!(
            client.query_stream("").await,
            Err(Error::EmptyQuery)
        ));
    }

    #[tokio::test]
    #[ignore = "requires PERPLEXITY_API_KEY and network access"]
    async fn integration_query_returns_text() {
        let client = PerplexityClient::from_env().expect("key should be configured");
        let answer = client.query(TEST_QUERY).await.expect("query should succeed");
        assert!(!answer.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires PERPLEXITY_API_KEY and network access"]
    async fn integration_query_batch_returns_choices() {
        let client = PerplexityClient::from_env().expect("key should be configured");
        let answers = client
            .query_batch(TEST_QUERY)
            .await
            .expect("batch query should succeed");
        assert!(!answers.is_empty());
        assert!(answers.iter().all(|a| !a.is_empty()));
    }

    #[tokio::test]
    #[ignore = "requires PERPLEXITY_API_KEY and network access"]
    async fn integration_query_stream_yields_fragments() {
        use futures_util::StreamExt;

        let client = PerplexityClient::from_env().expect("key should be configured");
        let mut stream = client
            .query_stream("Give me a comprehensive list of US presidents.")
            .await
            .expect("stream should open");

        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment.expect("fragment should arrive"));
        }
        assert!(!text.is_empty());
    }

    #[tokio::test]
    #[ignore = "requires PERPLEXITY_API_KEY and network access"]
    async fn integration_set_model_round_trips() {
        let mut client = PerplexityClient::from_env().expect("key should be configured");
        client
            .set_model("llama-3.1-sonar-large-128k-online")
            .await
            .expect("catalog model should be servable");
        assert_eq!(client.model(), "llama-3.1-sonar-large-128k-online");
    }
}
