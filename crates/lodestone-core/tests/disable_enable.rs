mod support;

use tempfile::TempDir;

use lodestone_core::fs::tree_hash::hash_tree_excluding;
use lodestone_core::identity;
use lodestone_core::layout::{BACKUPS_DIR, TargetLayout, TargetStatus};
use lodestone_core::uninstall::{UninstallCommand, UninstallMode, UninstallOptions, UninstallState};

fn installed_target(temp: &TempDir, user_notes: bool) -> std::path::PathBuf {
    let source = temp.path().join("pack");
    let target = temp.path().join("project");
    support::write_source_tree(&source);
    std::fs::create_dir(&target).unwrap();
    if user_notes {
        std::fs::write(target.join("AGENTS.md"), "user notes\n").unwrap();
    }
    support::install_fixture(&source, &target);
    target
}

#[test]
fn disable_renames_and_comments_without_deleting() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp, false);
    let layout = TargetLayout::new(&target);

    let report = UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Disable))
        .unwrap();
    assert_eq!(report.state, UninstallState::Disabled);

    assert!(!layout.config_dir().exists());
    assert!(layout.disabled_config_dir().is_dir());
    assert!(layout.disabled_identity_doc().is_file());
    assert_eq!(layout.detect().unwrap(), TargetStatus::Disabled);

    // The live identity document no longer carries the managed marker.
    if layout.identity_doc().exists() {
        let text = std::fs::read_to_string(layout.identity_doc()).unwrap();
        assert!(!identity::contains_managed_marker(&text));
    }

    // Owned env keys are commented, not removed.
    let env_text = std::fs::read_to_string(layout.env_file()).unwrap();
    assert!(env_text.contains("# lodestone:disabled LOCAL_AI_ENABLED=false"));
}

#[test]
fn disable_keeps_user_identity_content_live() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp, true);
    let layout = TargetLayout::new(&target);

    UninstallCommand::new(&target)
        .execute(&UninstallOptions::new(UninstallMode::Disable))
        .unwrap();

    let text = std::fs::read_to_string(layout.identity_doc()).unwrap();
    assert_eq!(text, "user notes\n");
}

#[test]
fn disable_enable_round_trip_restores_target_state() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp, true);
    let before = hash_tree_excluding(&target, &[BACKUPS_DIR]).unwrap();

    let command = UninstallCommand::new(&target);
    command
        .execute(&UninstallOptions::new(UninstallMode::Disable))
        .unwrap();
    command.enable().unwrap();

    assert_eq!(before, hash_tree_excluding(&target, &[BACKUPS_DIR]).unwrap());
    assert_eq!(
        TargetLayout::new(&target).detect().unwrap(),
        TargetStatus::Managed
    );
}

#[test]
fn enable_without_disabled_state_is_an_error() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp, false);
    assert!(UninstallCommand::new(&target).enable().is_err());
}

#[test]
fn destructive_modes_refuse_disabled_state() {
    let temp = TempDir::new().unwrap();
    let target = installed_target(&temp, false);
    let command = UninstallCommand::new(&target);
    command
        .execute(&UninstallOptions::new(UninstallMode::Disable))
        .unwrap();

    assert!(
        command
            .execute(&UninstallOptions::new(UninstallMode::Complete))
            .is_err()
    );
}
