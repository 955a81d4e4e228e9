//! Configuration provider switcher.
//!
//! Points the persisted configuration (env file + tool registry) at one
//! selected backend, then smoke-tests the result: a connectivity check
//! followed by a minimal inference round-trip. Smoke-test failures are
//! warnings, not rollbacks; the service may simply not be running yet.

use std::time::Duration;

use serde_json::{Value, json};

use crate::discovery::{DiscoveryEngine, Provider, ServiceDescriptor};
use crate::env_file::EnvFile;
use crate::fs::BackupStore;
use crate::layout::TargetLayout;
use crate::registry::{self, ToolRegistryEntry};

/// Registry entry name owned by the switcher.
pub const LOCAL_AI_ENTRY: &str = "local-ai";

/// Env selector key.
pub const PROVIDER_SELECTOR: &str = "LOCAL_AI_PROVIDER";
/// Feature-enabled flag.
pub const ENABLED_FLAG: &str = "LOCAL_AI_ENABLED";

/// Where to point the configuration.
#[derive(Debug, Clone)]
pub struct SwitchOptions {
    pub provider: Provider,
    pub host: String,
    pub port: u16,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Skip the live connectivity/inference checks entirely.
    pub skip_probe: bool,
}

impl SwitchOptions {
    /// Target a descriptor produced by discovery, taking its first model.
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        Self {
            provider: descriptor.provider,
            host: descriptor.host.clone(),
            port: descriptor.port,
            model: descriptor.models.first().cloned(),
            api_key: None,
            skip_probe: false,
        }
    }

    /// Manually supplied host/port/model.
    pub fn manual(provider: Provider, host: impl Into<String>, port: u16) -> Self {
        Self {
            provider,
            host: host.into(),
            port,
            model: None,
            api_key: None,
            skip_probe: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_skip_probe(mut self, skip: bool) -> Self {
        self.skip_probe = skip;
        self
    }

    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Outcome of a switch. The configuration write succeeded if this struct
/// exists at all; the probe fields report the smoke test.
#[derive(Debug, Clone)]
pub struct SwitchReport {
    pub provider: Provider,
    pub base_url: String,
    pub model: Option<String>,
    pub connectivity: bool,
    pub inference: bool,
    pub warnings: Vec<String>,
}

/// Switch orchestrator for one installation root.
#[derive(Debug)]
pub struct SwitchCommand {
    layout: TargetLayout,
    backups: BackupStore,
    probe_timeout: Duration,
    inference_timeout: Duration,
}

impl SwitchCommand {
    pub fn new(layout: TargetLayout) -> Self {
        let backups = BackupStore::new(layout.backups_dir());
        Self {
            layout,
            backups,
            probe_timeout: Duration::from_secs(2),
            inference_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_timeouts(mut self, probe: Duration, inference: Duration) -> Self {
        self.probe_timeout = probe;
        self.inference_timeout = inference;
        self
    }

    /// Back up, rewrite env + registry for exactly one provider, then smoke
    /// test. The write is atomic per file; a reader sees the old or the new
    /// configuration, never a mix within one file.
    pub async fn execute(&self, options: &SwitchOptions) -> anyhow::Result<SwitchReport> {
        let env_path = self.layout.env_file();
        if env_path.exists() {
            self.backups.create("pre-switch", &[env_path.clone()])?;
        }

        self.write_env(options)?;
        self.write_registry(options)?;
        tracing::info!(
            "Configuration now points at {} ({})",
            options.provider.label(),
            options.base_url()
        );

        let mut report = SwitchReport {
            provider: options.provider,
            base_url: options.base_url(),
            model: options.model.clone(),
            connectivity: false,
            inference: false,
            warnings: Vec::new(),
        };

        if options.skip_probe {
            return Ok(report);
        }

        let engine = DiscoveryEngine::new(self.probe_timeout, self.probe_timeout);
        match engine
            .probe(options.provider, &options.host, options.port, self.probe_timeout)
            .await
        {
            Some(_) => report.connectivity = true,
            None => {
                report.warnings.push(format!(
                    "{} is not reachable at {}; configuration kept, start the service and re-run validate",
                    options.provider.label(),
                    options.base_url()
                ));
                return Ok(report);
            }
        }

        match self.inference_check(options).await {
            Ok(()) => report.inference = true,
            Err(err) => {
                report
                    .warnings
                    .push(format!("Inference round-trip failed: {err}"));
            }
        }

        Ok(report)
    }

    /// Rewrite the env record: selector plus exactly the chosen provider's
    /// key group. Other providers' keys stay present but inactive.
    fn write_env(&self, options: &SwitchOptions) -> anyhow::Result<()> {
        let env_path = self.layout.env_file();
        let mut env = EnvFile::load(&env_path);
        let prefix = options.provider.env_prefix();

        env.set(PROVIDER_SELECTOR, options.provider.key());
        env.set(ENABLED_FLAG, "true");
        env.set(format!("{prefix}_BASE_URL"), options.base_url());
        // An omitted model or key also clears whatever an earlier switch to
        // this provider left behind.
        match &options.model {
            Some(model) => env.set(format!("{prefix}_MODEL"), model.clone()),
            None => {
                env.remove(&format!("{prefix}_MODEL"));
            }
        }
        match &options.api_key {
            Some(key) => env.set(format!("{prefix}_API_KEY"), key.clone()),
            None => {
                env.remove(&format!("{prefix}_API_KEY"));
            }
        }
        env.save(&env_path)
    }

    /// Structured rewrite of the registry entry wrapping the connection
    /// parameters.
    fn write_registry(&self, options: &SwitchOptions) -> anyhow::Result<()> {
        let mut args = vec![
            "-y".to_string(),
            "mcp-local-ai".to_string(),
            "--provider".to_string(),
            options.provider.key().to_string(),
            "--base-url".to_string(),
            options.base_url(),
        ];
        if let Some(model) = &options.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        let entry = ToolRegistryEntry {
            command: "npx".to_string(),
            args,
            description: format!("Local AI inference bridge ({})", options.provider.label()),
        };
        registry::upsert_entry(&self.layout.registry_file(), LOCAL_AI_ENTRY, &entry)
    }

    /// Send a trivial prompt; any non-empty response within the timeout
    /// passes.
    async fn inference_check(&self, options: &SwitchOptions) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let model = options.model.as_deref().unwrap_or("default");

        let (url, body) = if options.provider.openai_compatible() {
            (
                format!("{}/v1/chat/completions", options.base_url()),
                json!({
                    "model": model,
                    "messages": [{"role": "user", "content": "Reply with one word."}],
                    "max_tokens": 8,
                }),
            )
        } else {
            (
                format!("{}/api/generate", options.base_url()),
                json!({
                    "model": model,
                    "prompt": "Reply with one word.",
                    "stream": false,
                }),
            )
        };

        let response = client
            .post(&url)
            .json(&body)
            .timeout(self.inference_timeout)
            .send()
            .await?
            .error_for_status()?;
        let body: Value = response.json().await?;

        let text = if options.provider.openai_compatible() {
            body.pointer("/choices/0/message/content")
                .and_then(Value::as_str)
                .unwrap_or("")
        } else {
            body.get("response").and_then(Value::as_str).unwrap_or("")
        };
        if text.trim().is_empty() {
            anyhow::bail!("Empty completion from {url}");
        }
        Ok(())
    }
}
