//! Read-only post-condition checker.
//!
//! Walks the managed footprint and produces a diagnostic report: file
//! presence and executability, JSON well-formedness, marker presence, and
//! live reachability of the configured provider. Never mutates anything;
//! the process exit code should reflect required failures only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::discovery::{DiscoveryEngine, Provider};
use crate::env_file::EnvFile;
use crate::fs::is_executable;
use crate::identity;
use crate::layout::{TargetLayout, TargetStatus};
use crate::registry;
use crate::switcher::PROVIDER_SELECTOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Required,
    Optional,
}

/// One line of the report.
#[derive(Debug, Clone, Serialize)]
pub struct Check {
    pub name: String,
    pub severity: Severity,
    pub status: CheckStatus,
    pub detail: String,
}

/// Diagnostic artifact; regenerated on every run, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub target: PathBuf,
    pub checks: Vec<Check>,
}

impl ValidationReport {
    pub fn required_failures(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.severity == Severity::Required && c.status == CheckStatus::Fail)
            .count()
    }

    /// Whether every required check passed. Optional checks never affect
    /// this.
    pub fn passed(&self) -> bool {
        self.required_failures() == 0
    }
}

/// Validator for one target root.
#[derive(Debug)]
pub struct ValidateCommand {
    layout: TargetLayout,
    probe_timeout: Duration,
}

impl ValidateCommand {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        Self {
            layout: TargetLayout::new(target_root),
            probe_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Run every check. Read-only; individual check errors are folded into
    /// the report rather than propagated.
    pub async fn execute(&self) -> anyhow::Result<ValidationReport> {
        let mut checks = Vec::new();

        self.check_footprint(&mut checks)?;
        self.check_registry(&mut checks);
        self.check_settings(&mut checks);
        self.check_scripts(&mut checks);
        self.check_provider(&mut checks).await;

        Ok(ValidationReport {
            target: self.layout.root().to_path_buf(),
            checks,
        })
    }

    fn check_footprint(&self, checks: &mut Vec<Check>) -> anyhow::Result<()> {
        let status = self.layout.detect()?;
        checks.push(match status {
            TargetStatus::Managed => pass("managed tree", Severity::Required, "marker present"),
            TargetStatus::Disabled => fail(
                "managed tree",
                Severity::Required,
                "installation is disabled",
            ),
            TargetStatus::Foreign => fail(
                "managed tree",
                Severity::Required,
                "configuration directory exists but the identity document lacks the marker",
            ),
            TargetStatus::Absent => fail(
                "managed tree",
                Severity::Required,
                "no configuration directory",
            ),
        });

        checks.push(presence(
            "identity document",
            Severity::Required,
            &self.layout.identity_doc(),
        ));
        if let Ok(text) = std::fs::read_to_string(self.layout.identity_doc()) {
            checks.push(if identity::contains_managed_marker(&text) {
                pass("identity marker", Severity::Required, "present")
            } else {
                fail("identity marker", Severity::Required, "missing")
            });
        }
        checks.push(presence(
            "env file",
            Severity::Required,
            &self.layout.env_file(),
        ));
        checks.push(presence(
            "quick-start document",
            Severity::Optional,
            &self.layout.quickstart_doc(),
        ));
        Ok(())
    }

    fn check_registry(&self, checks: &mut Vec<Check>) {
        let path = self.layout.registry_file();
        if !path.exists() {
            checks.push(fail("tool registry", Severity::Required, "file missing"));
            return;
        }
        checks.push(match registry::load_entries(&path) {
            Ok(entries) => pass(
                "tool registry",
                Severity::Required,
                format!("valid JSON, {} entries", entries.len()),
            ),
            Err(err) => fail("tool registry", Severity::Required, format!("{err:#}")),
        });
    }

    fn check_settings(&self, checks: &mut Vec<Check>) {
        let path = self.layout.config_dir().join("settings.json");
        if !path.exists() {
            checks.push(fail("settings document", Severity::Required, "file missing"));
            return;
        }
        checks.push(match registry::load_json_map(&path) {
            Ok(_) => pass("settings document", Severity::Required, "valid JSON"),
            Err(err) => fail("settings document", Severity::Required, format!("{err:#}")),
        });
    }

    fn check_scripts(&self, checks: &mut Vec<Check>) {
        let scripts_dir = self.layout.config_dir().join("scripts");
        if !scripts_dir.is_dir() {
            checks.push(fail("scripts", Severity::Required, "directory missing"));
            return;
        }
        let mut not_executable = Vec::new();
        collect_non_executable(&scripts_dir, &mut not_executable);
        checks.push(if not_executable.is_empty() {
            pass("scripts", Severity::Required, "all executable")
        } else {
            fail(
                "scripts",
                Severity::Required,
                format!("not executable: {}", not_executable.join(", ")),
            )
        });
    }

    /// Live reachability of the configured provider. Optional by design: an
    /// unreachable backend is reported, never an installation failure.
    async fn check_provider(&self, checks: &mut Vec<Check>) {
        let env = EnvFile::load(&self.layout.env_file());
        let Some(selector) = env.get(PROVIDER_SELECTOR) else {
            checks.push(warn(
                "configured provider",
                Severity::Optional,
                "no provider selected",
            ));
            return;
        };
        let provider: Provider = match selector.parse() {
            Ok(provider) => provider,
            Err(_) => {
                checks.push(fail(
                    "configured provider",
                    Severity::Required,
                    format!("unknown selector value: {selector}"),
                ));
                return;
            }
        };
        let base_url = env
            .get(&format!("{}_BASE_URL", provider.env_prefix()))
            .map(str::to_string);
        let Some(base_url) = base_url else {
            checks.push(fail(
                "configured provider",
                Severity::Required,
                format!("{selector} selected but its base URL is unset"),
            ));
            return;
        };
        let Some((host, port)) = parse_host_port(&base_url) else {
            checks.push(fail(
                "configured provider",
                Severity::Required,
                format!("unparseable base URL: {base_url}"),
            ));
            return;
        };

        let engine = DiscoveryEngine::new(self.probe_timeout, self.probe_timeout);
        checks.push(
            match engine.probe(provider, &host, port, self.probe_timeout).await {
                Some(descriptor) => pass(
                    "provider reachable",
                    Severity::Optional,
                    format!(
                        "{} at {} ({} models)",
                        provider.label(),
                        base_url,
                        descriptor.models.len()
                    ),
                ),
                None => warn(
                    "provider reachable",
                    Severity::Optional,
                    format!("{} did not answer at {}", provider.label(), base_url),
                ),
            },
        );
    }
}

fn parse_host_port(base_url: &str) -> Option<(String, u16)> {
    let parsed = url::Url::parse(base_url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;
    Some((host, port))
}

fn collect_non_executable(dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_non_executable(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "sh") && !is_executable(&path) {
            out.push(path.file_name().unwrap_or_default().to_string_lossy().to_string());
        }
    }
}

fn pass(name: &str, severity: Severity, detail: impl Into<String>) -> Check {
    check(name, severity, CheckStatus::Pass, detail)
}

fn warn(name: &str, severity: Severity, detail: impl Into<String>) -> Check {
    check(name, severity, CheckStatus::Warn, detail)
}

fn fail(name: &str, severity: Severity, detail: impl Into<String>) -> Check {
    check(name, severity, CheckStatus::Fail, detail)
}

fn check(name: &str, severity: Severity, status: CheckStatus, detail: impl Into<String>) -> Check {
    Check {
        name: name.to_string(),
        severity,
        status,
        detail: detail.into(),
    }
}

fn presence(name: &str, severity: Severity, path: &Path) -> Check {
    if path.exists() {
        pass(name, severity, "present")
    } else {
        match severity {
            Severity::Required => fail(name, severity, "missing"),
            Severity::Optional => warn(name, severity, "missing"),
        }
    }
}
