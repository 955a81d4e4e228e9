//! Interactive prompts for install and configure flows.
//!
//! Uses dialoguer for terminal UI prompts. Every prompt has a
//! non-interactive bypass (`--auto` or explicit flags) so the tool stays
//! scriptable.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Select, theme::ColorfulTheme};

use lodestone_core::discovery::ServiceDescriptor;

/// Ask before replacing an existing installation.
pub fn confirm_replace(config_dir: &std::path::Path) -> Result<bool> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "{} already exists. Back it up and replace it?",
            style(config_dir.display()).cyan()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}

/// Ask before shelling out to a package manager for a missing tool.
pub fn confirm_tool_install(tool: &str) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Required tool {} is missing. Install it now?",
            style(tool).yellow()
        ))
        .default(true)
        .interact()
        .unwrap_or(false)
}

/// Pick one discovered backend, or none to skip configuration.
pub fn select_service(services: &[ServiceDescriptor]) -> Result<Option<usize>> {
    let mut items: Vec<String> = services
        .iter()
        .map(|s| {
            let models = if s.models.is_empty() {
                "no models listed".to_string()
            } else {
                format!("{} models", s.models.len())
            };
            format!("{} at {} ({models})", s.provider.label(), s.base_url())
        })
        .collect();
    items.push("Skip configuration".to_string());

    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a local AI backend")
        .items(&items)
        .default(0)
        .interact()?;
    if choice == services.len() {
        Ok(None)
    } else {
        Ok(Some(choice))
    }
}

/// Pick a model from the backend's listing; first entry is the default.
pub fn select_model(models: &[String]) -> Result<Option<String>> {
    if models.is_empty() {
        return Ok(None);
    }
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a model")
        .items(models)
        .default(0)
        .interact()?;
    Ok(models.get(choice).cloned())
}
