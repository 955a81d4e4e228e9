mod support;

use std::time::Duration;

use tempfile::TempDir;

use lodestone_core::discovery::Provider;
use lodestone_core::env_file::EnvFile;
use lodestone_core::layout::TargetLayout;
use lodestone_core::registry;
use lodestone_core::switcher::{
    ENABLED_FLAG, LOCAL_AI_ENTRY, PROVIDER_SELECTOR, SwitchCommand, SwitchOptions,
};

fn installed_layout(temp: &TempDir) -> TargetLayout {
    let source = temp.path().join("pack");
    let target = temp.path().join("project");
    support::write_source_tree(&source);
    std::fs::create_dir(&target).unwrap();
    support::install_fixture(&source, &target);
    TargetLayout::new(target)
}

#[tokio::test]
async fn switch_writes_selector_and_one_provider_group() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let env_path = layout.env_file();

    let options = SwitchOptions::manual(Provider::Ollama, "localhost", 11434)
        .with_model("llama3.2")
        .with_skip_probe(true);
    let report = SwitchCommand::new(layout).execute(&options).await.unwrap();

    assert_eq!(report.provider, Provider::Ollama);
    assert_eq!(report.base_url, "http://localhost:11434");

    let env = EnvFile::load(&env_path);
    assert_eq!(env.get(PROVIDER_SELECTOR), Some("ollama"));
    assert_eq!(env.get(ENABLED_FLAG), Some("true"));
    assert_eq!(env.get("OLLAMA_BASE_URL"), Some("http://localhost:11434"));
    assert_eq!(env.get("OLLAMA_MODEL"), Some("llama3.2"));
    assert_eq!(env.get("VLLM_BASE_URL"), None);
    assert_eq!(env.get("LMSTUDIO_BASE_URL"), None);
}

#[tokio::test]
async fn switching_providers_leaves_old_group_but_moves_selector() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let env_path = layout.env_file();
    let command = SwitchCommand::new(layout);

    let first = SwitchOptions::manual(Provider::Ollama, "localhost", 11434)
        .with_skip_probe(true);
    command.execute(&first).await.unwrap();

    let second = SwitchOptions::manual(Provider::Vllm, "localhost", 8000)
        .with_model("served-model")
        .with_skip_probe(true);
    command.execute(&second).await.unwrap();

    let env = EnvFile::load(&env_path);
    assert_eq!(env.get(PROVIDER_SELECTOR), Some("vllm"));
    assert_eq!(env.get("VLLM_BASE_URL"), Some("http://localhost:8000"));
    // The previous group stays as a record; only the selector is live.
    assert_eq!(env.get("OLLAMA_BASE_URL"), Some("http://localhost:11434"));
}

#[tokio::test]
async fn switch_without_model_clears_stale_model_key() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let env_path = layout.env_file();
    let command = SwitchCommand::new(layout);

    let with_model = SwitchOptions::manual(Provider::Ollama, "localhost", 11434)
        .with_model("llama3.2")
        .with_skip_probe(true);
    command.execute(&with_model).await.unwrap();

    let without_model =
        SwitchOptions::manual(Provider::Ollama, "localhost", 11434).with_skip_probe(true);
    command.execute(&without_model).await.unwrap();

    let env = EnvFile::load(&env_path);
    assert_eq!(env.get("OLLAMA_BASE_URL"), Some("http://localhost:11434"));
    assert_eq!(env.get("OLLAMA_MODEL"), None);
}

#[tokio::test]
async fn switch_rewrites_registry_entry_with_connection_args() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let registry_path = layout.registry_file();

    let options = SwitchOptions::manual(Provider::Vllm, "localhost", 8000)
        .with_model("served-model")
        .with_skip_probe(true);
    SwitchCommand::new(layout).execute(&options).await.unwrap();

    let entry = registry::get_entry(&registry_path, LOCAL_AI_ENTRY)
        .unwrap()
        .expect("switch should create the bridge entry");
    assert_eq!(entry.command, "npx");
    assert!(entry.args.contains(&"--provider".to_string()));
    assert!(entry.args.contains(&"vllm".to_string()));
    assert!(entry.args.contains(&"http://localhost:8000".to_string()));
    assert!(entry.args.contains(&"served-model".to_string()));

    // The file stays valid JSON and keeps the pre-existing entries.
    let entries = registry::load_entries(&registry_path).unwrap();
    assert!(entries.contains_key("pack-tools"));
    assert!(entries.contains_key(LOCAL_AI_ENTRY));
}

#[tokio::test]
async fn unreachable_backend_is_a_warning_not_an_error() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let env_path = layout.env_file();

    let options = SwitchOptions::manual(Provider::LmStudio, "127.0.0.1", support::unused_port());
    let report = SwitchCommand::new(layout)
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(200))
        .execute(&options)
        .await
        .unwrap();

    assert!(!report.connectivity);
    assert!(!report.inference);
    assert_eq!(report.warnings.len(), 1);

    // Configuration was still written.
    let env = EnvFile::load(&env_path);
    assert_eq!(env.get(PROVIDER_SELECTOR), Some("lmstudio"));
}

#[tokio::test]
async fn switch_backs_up_prior_env_file() {
    let temp = TempDir::new().unwrap();
    let layout = installed_layout(&temp);
    let backups_dir = layout.backups_dir();

    let options = SwitchOptions::manual(Provider::Ollama, "localhost", 11434)
        .with_skip_probe(true);
    SwitchCommand::new(layout).execute(&options).await.unwrap();

    let snapshots: Vec<_> = std::fs::read_dir(&backups_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert!(
        snapshots.iter().any(|name| name.contains("pre-switch")),
        "snapshots: {snapshots:?}"
    );
}
