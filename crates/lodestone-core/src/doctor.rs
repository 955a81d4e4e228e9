//! Dependency prechecker.
//!
//! Inspects the live environment for the tools the extension pack shells out
//! to. Missing required tools either trigger a remediation attempt (guided
//! or automatic) or fail the run; missing optional tools are reported only.
//! This checks prerequisites, it never installs the pack itself.

use std::process::Command;

use serde::Serialize;

use crate::error::LifecycleError;
use crate::util::{HostOs, command_exists};

/// Tools the pack's hooks and scripts invoke at runtime.
const REQUIRED_TOOLS: &[&str] = &["curl", "jq"];
/// Nice-to-haves; reported but never blocking.
const OPTIONAL_TOOLS: &[&str] = &["git", "node", "docker"];

/// Result of probing for one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub tool: String,
    pub required: bool,
    pub present: bool,
}

/// Full precheck result.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub os: String,
    pub checks: Vec<ToolCheck>,
}

impl DoctorReport {
    /// Required tools that were not found.
    pub fn missing_required(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.present)
            .map(|c| c.tool.as_str())
            .collect()
    }

    pub fn all_required_present(&self) -> bool {
        self.missing_required().is_empty()
    }
}

/// Precheck orchestrator.
#[derive(Debug, Default)]
pub struct DoctorCommand {
    /// Attempt remediation without prompting.
    pub auto: bool,
}

impl DoctorCommand {
    pub fn new(auto: bool) -> Self {
        Self { auto }
    }

    /// Detect the OS and probe every known tool. Read-only.
    pub fn run(&self) -> DoctorReport {
        let os = HostOs::detect();
        let mut checks = Vec::new();
        for tool in REQUIRED_TOOLS {
            checks.push(ToolCheck {
                tool: tool.to_string(),
                required: true,
                present: command_exists(tool),
            });
        }
        for tool in OPTIONAL_TOOLS {
            checks.push(ToolCheck {
                tool: tool.to_string(),
                required: false,
                present: command_exists(tool),
            });
        }
        tracing::debug!("Precheck on {}: {} tools probed", os.label(), checks.len());
        DoctorReport {
            os: os.label().to_string(),
            checks,
        }
    }

    /// Attempt to install missing required tools. `confirm` is consulted per
    /// tool unless `auto` is set; declining with the tool still missing is a
    /// hard failure.
    pub fn remediate(
        &self,
        report: &DoctorReport,
        mut confirm: impl FnMut(&str) -> bool,
    ) -> anyhow::Result<()> {
        let os = HostOs::detect();
        for tool in report.missing_required() {
            let remediation = install_command(os, tool);
            if !self.auto && !confirm(tool) {
                return Err(LifecycleError::DependencyMissing {
                    tool: tool.to_string(),
                    remediation,
                }
                .into());
            }
            tracing::info!("Installing missing dependency: {tool}");
            run_installer(os, tool)?;
            if !command_exists(tool) {
                return Err(LifecycleError::DependencyMissing {
                    tool: tool.to_string(),
                    remediation,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Human-facing remediation command for diagnostics.
fn install_command(os: HostOs, tool: &str) -> String {
    match os {
        HostOs::MacOs => format!("brew install {tool}"),
        HostOs::Linux => {
            if command_exists("apt-get") {
                format!("sudo apt-get install -y {tool}")
            } else if command_exists("dnf") {
                format!("sudo dnf install -y {tool}")
            } else {
                format!("install {tool} with your distribution's package manager")
            }
        }
        _ => format!("install {tool} manually"),
    }
}

fn run_installer(os: HostOs, tool: &str) -> anyhow::Result<()> {
    let status = match os {
        HostOs::MacOs => Command::new("brew").args(["install", tool]).status(),
        HostOs::Linux if command_exists("apt-get") => Command::new("sudo")
            .args(["apt-get", "install", "-y", tool])
            .status(),
        HostOs::Linux if command_exists("dnf") => Command::new("sudo")
            .args(["dnf", "install", "-y", tool])
            .status(),
        _ => {
            anyhow::bail!("No known installer for {tool} on this platform");
        }
    };
    let status = status.map_err(|err| anyhow::anyhow!("Failed to run installer: {err}"))?;
    if !status.success() {
        anyhow::bail!("Installer for {tool} exited with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_probes_all_known_tools() {
        let report = DoctorCommand::new(false).run();
        assert_eq!(
            report.checks.len(),
            REQUIRED_TOOLS.len() + OPTIONAL_TOOLS.len()
        );
    }

    #[test]
    fn missing_required_only_lists_required_tools() {
        let report = DoctorReport {
            os: "linux".to_string(),
            checks: vec![
                ToolCheck {
                    tool: "curl".into(),
                    required: true,
                    present: false,
                },
                ToolCheck {
                    tool: "docker".into(),
                    required: false,
                    present: false,
                },
            ],
        };
        assert_eq!(report.missing_required(), vec!["curl"]);
        assert!(!report.all_required_present());
    }

    #[test]
    fn remediate_fails_when_confirmation_declined() {
        let report = DoctorReport {
            os: "linux".to_string(),
            checks: vec![ToolCheck {
                tool: "curl".into(),
                required: true,
                present: false,
            }],
        };
        let cmd = DoctorCommand::new(false);
        let result = cmd.remediate(&report, |_| false);
        assert!(result.is_err());
    }
}
