mod support;

use tempfile::TempDir;

use lodestone_core::fs::BackupStore;
use lodestone_core::fs::tree_hash::hash_tree_excluding;
use lodestone_core::layout::{BACKUPS_DIR, TargetLayout, TargetStatus};
use lodestone_core::registry;
use lodestone_core::uninstall::{
    ComponentKind, UninstallCommand, UninstallMode, UninstallOptions, UninstallState,
};

fn installed_target(temp: &TempDir) -> std::path::PathBuf {
    let source = temp.path().join("pack");
    let target = temp.path().join("project");
    support::write_source_tree(&source);
    std::fs::create_dir(&target).unwrap();
    support::install_fixture(&source, &target);
    target
}

#[test]
fn complete_uninstall_removes_managed_footprint() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);

    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Complete))
        .unwrap();

    assert_eq!(report.state, UninstallState::Complete);
    assert!(report.backup.is_some());
    assert!(!layout.config_dir().exists());
    assert!(!layout.env_file().exists());
    assert!(!layout.registry_file().exists());
    assert!(!layout.quickstart_doc().exists());
    // No prior user content existed, so the identity document is gone too.
    assert!(!layout.identity_doc().exists());
    assert_eq!(layout.detect().unwrap(), TargetStatus::Absent);
}

#[test]
fn complete_uninstall_extracts_prior_user_content() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("pack");
    let target = temp.path().join("project");
    support::write_source_tree(&source);
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("AGENTS.md"), "hand-written notes\n").unwrap();
    support::install_fixture(&source, &target);

    UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Complete))
        .unwrap();

    let text = std::fs::read_to_string(target.join("AGENTS.md")).unwrap();
    assert_eq!(text, "hand-written notes\n");
}

#[test]
fn partial_uninstall_preserves_env_and_registry() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);
    let env_before = std::fs::read_to_string(layout.env_file()).unwrap();
    let registry_before = std::fs::read_to_string(layout.registry_file()).unwrap();

    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Partial))
        .unwrap();

    assert_eq!(report.state, UninstallState::Partial);
    assert!(!layout.config_dir().exists());
    assert_eq!(std::fs::read_to_string(layout.env_file()).unwrap(), env_before);
    assert_eq!(
        std::fs::read_to_string(layout.registry_file()).unwrap(),
        registry_before
    );
}

#[test]
fn backup_restores_pre_uninstall_state() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let before = hash_tree_excluding(&target, &[BACKUPS_DIR]).unwrap();

    let layout = TargetLayout::new(&target);
    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Partial))
        .unwrap();
    let backup_path = report.backup.unwrap();

    let store = BackupStore::new(layout.backups_dir());
    let manifest = store
        .list()
        .unwrap()
        .into_iter()
        .find(|m| m.path == backup_path)
        .unwrap();
    store.restore(&manifest, &target).unwrap();

    assert_eq!(before, hash_tree_excluding(&target, &[BACKUPS_DIR]).unwrap());
}

#[test]
fn no_backup_flag_skips_snapshot() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);

    let report = UninstallCommand::new(&target)
        .execute(
            &UninstallOptions::new(UninstallMode::Partial)
                .with_backup(false),
        )
        .unwrap();

    assert!(report.backup.is_none());
    assert!(!report.warnings.is_empty());
}

#[test]
fn complete_with_backup_prunes_older_snapshots() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);
    let store = BackupStore::new(layout.backups_dir());
    let old = store.create("manual", &[layout.env_file()]).unwrap();

    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Complete))
        .unwrap();

    assert!(!old.path.exists());
    assert!(report.backup.unwrap().is_dir());
}

#[test]
fn complete_without_backup_keeps_existing_snapshots() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);
    let store = BackupStore::new(layout.backups_dir());
    let old = store.create("manual", &[layout.env_file()]).unwrap();

    UninstallCommand::new(&target)
        .execute(
            &UninstallOptions::new(UninstallMode::Complete)
                .with_backup(false),
        )
        .unwrap();

    // The only surviving recovery path is the pre-existing snapshot.
    assert!(old.path.is_dir());
}

#[test]
fn dry_run_reports_plan_without_mutating() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let before = hash_tree_excluding(&target, &[]).unwrap();

    let report = UninstallCommand::new(&target)
        .execute(
            &UninstallOptions::new(UninstallMode::Complete)
                .with_dry_run(true),
        )
        .unwrap();

    assert!(report.dry_run);
    assert!(!report.actions.is_empty());
    assert_eq!(before, hash_tree_excluding(&target, &[]).unwrap());
}

#[test]
fn component_registry_removes_only_installer_entries() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);

    // A user entry added after installation must survive.
    registry::upsert_entry(
        &layout.registry_file(),
        "my-tool",
        &registry::ToolRegistryEntry {
            command: "echo".to_string(),
            args: vec![],
            description: "user entry".to_string(),
        },
    )
    .unwrap();

    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Component(
            ComponentKind::Registry,
        )))
        .unwrap();
    assert_eq!(report.state, UninstallState::ComponentRemoved);

    let entries = registry::load_entries(&layout.registry_file()).unwrap();
    assert!(entries.contains_key("my-tool"));
    assert!(!entries.contains_key("pack-tools"));
    // Registry removal leaves the rest of the footprint managed.
    assert_eq!(layout.detect().unwrap(), TargetStatus::Managed);
}

#[test]
fn component_hooks_removes_only_that_subtree() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp);
    let layout = TargetLayout::new(&target);

    UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Component(
            ComponentKind::Hooks,
        )))
        .unwrap();

    assert!(!layout.config_dir().join("hooks").exists());
    assert!(layout.config_dir().join("scripts").exists());
    assert_eq!(layout.detect().unwrap(), TargetStatus::Managed);
}

#[test]
fn uninstall_refuses_unmanaged_tree_without_force() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("project");
    std::fs::create_dir_all(target.join(".agent")).unwrap();
    std::fs::write(target.join(".agent/settings.json"), "{}").unwrap();

    let command = UninstallCommand::new(&target);
    assert!(
        command
            .execute(&UninstallOptions::new(UninstallMode::Complete))
            .is_err()
    );
    assert!(
        command
            .execute(&UninstallOptions::new(UninstallMode::Complete).with_force(true))
            .is_ok()
    );
}

#[test]
fn uninstall_on_empty_target_is_an_error() {
    let temp = TempDir::new().unwrap();
    let command = UninstallCommand::new(temp.path());
    assert!(
        command
            .execute(&UninstallOptions::new(UninstallMode::Complete))
            .is_err()
    );
}
