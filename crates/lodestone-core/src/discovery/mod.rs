//! Local inference backend discovery.
//!
//! Probes a fixed ordered list of well-known provider ports on localhost
//! with short timeouts, then (only when explicitly requested) sweeps private
//! subnets in bounded concurrent batches. An empty result is a valid
//! outcome, distinct from any probe-transport error, which is folded into
//! `reachable: false` and never propagated.

pub mod subnet;

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A known local-inference backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    LmStudio,
    LlamaCpp,
    Vllm,
}

impl Provider {
    /// All providers, in probe preference order.
    pub const ALL: &[Provider] = &[
        Provider::Ollama,
        Provider::LmStudio,
        Provider::LlamaCpp,
        Provider::Vllm,
    ];

    /// Stable identifier used in the env selector.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
            Self::LlamaCpp => "llamacpp",
            Self::Vllm => "vllm",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::LmStudio => "LM Studio",
            Self::LlamaCpp => "llama.cpp",
            Self::Vllm => "vLLM",
        }
    }

    /// Env key prefix for this provider's key group.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Ollama => "OLLAMA",
            Self::LmStudio => "LMSTUDIO",
            Self::LlamaCpp => "LLAMACPP",
            Self::Vllm => "VLLM",
        }
    }

    /// Well-known ports, most common first. The first reachable port wins
    /// and further ports for the same provider are skipped.
    pub fn candidate_ports(&self) -> &'static [u16] {
        match self {
            Self::Ollama => &[11434],
            Self::LmStudio => &[1234],
            Self::LlamaCpp => &[8080, 8081],
            Self::Vllm => &[8000],
        }
    }

    /// Cheap health-check path.
    pub fn health_path(&self) -> &'static str {
        match self {
            Self::Ollama => "/api/tags",
            Self::LlamaCpp => "/health",
            Self::LmStudio | Self::Vllm => "/v1/models",
        }
    }

    /// Whether this provider speaks the OpenAI-compatible surface (as
    /// opposed to Ollama's native API).
    pub fn openai_compatible(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "lmstudio" | "lm-studio" => Ok(Self::LmStudio),
            "llamacpp" | "llama.cpp" | "llama-cpp" => Ok(Self::LlamaCpp),
            "vllm" => Ok(Self::Vllm),
            other => anyhow::bail!("Unknown provider: {other}"),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A detected candidate backend. Not persisted; recomputed per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub provider: Provider,
    pub host: String,
    pub port: u16,
    pub models: Vec<String>,
    pub reachable: bool,
}

impl ServiceDescriptor {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn is_localhost(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

/// Probing engine with fixed per-class timeouts.
#[derive(Debug, Clone)]
pub struct DiscoveryEngine {
    client: reqwest::Client,
    local_timeout: Duration,
    lan_timeout: Duration,
}

impl Default for DiscoveryEngine {
    fn default() -> Self {
        Self::new(Duration::from_millis(600), Duration::from_millis(150))
    }
}

impl DiscoveryEngine {
    pub fn new(local_timeout: Duration, lan_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            local_timeout,
            lan_timeout,
        }
    }

    /// Run the fast localhost pass and, when `include_lan` is set, the
    /// slower subnet sweep. Results come back most-preferred first:
    /// localhost before LAN, lower port as tiebreak.
    pub async fn discover(&self, include_lan: bool) -> Vec<ServiceDescriptor> {
        let candidates = default_candidates("localhost");
        let mut found = self.probe_candidates(&candidates, self.local_timeout).await;

        if include_lan {
            let already: Vec<Provider> = found.iter().map(|d| d.provider).collect();
            if let Some(hit) = subnet::sweep(self, &already).await {
                found.push(hit);
            }
        }

        found.sort_by_key(|d| (!d.is_localhost(), d.port));
        found
    }

    /// Probe an ordered candidate list. The first success for a provider
    /// short-circuits its remaining candidates. Output order is the stable
    /// preference order (localhost first, port ascending), so repeated runs
    /// against the same reachable set return the same list.
    pub async fn probe_candidates(
        &self,
        candidates: &[(Provider, String, u16)],
        timeout: Duration,
    ) -> Vec<ServiceDescriptor> {
        let mut found: Vec<ServiceDescriptor> = Vec::new();
        for (provider, host, port) in candidates {
            if found.iter().any(|d| d.provider == *provider) {
                continue;
            }
            if let Some(descriptor) = self.probe(*provider, host, *port, timeout).await {
                found.push(descriptor);
            }
        }
        found.sort_by_key(|d| (!d.is_localhost(), d.port));
        found
    }

    /// One HTTP health probe. Any transport error or non-success status is
    /// treated as "not here", never an error.
    pub async fn probe(
        &self,
        provider: Provider,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Option<ServiceDescriptor> {
        let url = format!("http://{host}:{port}{}", provider.health_path());
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            tracing::trace!("Probe {url} answered {}", response.status());
            return None;
        }
        let models = parse_models(provider, response.json::<Value>().await.ok());
        tracing::debug!("Found {} at {host}:{port}", provider.label());
        Some(ServiceDescriptor {
            provider,
            host: host.to_string(),
            port,
            models,
            reachable: true,
        })
    }

    pub(crate) fn lan_timeout(&self) -> Duration {
        self.lan_timeout
    }
}

/// The well-known `(provider, host, port)` tuples for one host, in probe
/// preference order.
pub fn default_candidates(host: &str) -> Vec<(Provider, String, u16)> {
    let mut candidates = Vec::new();
    for provider in Provider::ALL {
        for port in provider.candidate_ports() {
            candidates.push((*provider, host.to_string(), *port));
        }
    }
    candidates
}

/// Pull model names out of a health/listing response body.
///
/// Ollama: `{"models": [{"name": ...}]}`; OpenAI-style: `{"data": [{"id": ...}]}`.
/// llama.cpp's `/health` carries no models; those stay empty.
fn parse_models(provider: Provider, body: Option<Value>) -> Vec<String> {
    let Some(body) = body else {
        return Vec::new();
    };
    let (list_key, name_key) = match provider {
        Provider::Ollama => ("models", "name"),
        _ => ("data", "id"),
    };
    body.get(list_key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(name_key))
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
