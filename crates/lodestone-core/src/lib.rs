//! Lodestone Core Library
//!
//! Provides the domain logic for installing, configuring, and removing the
//! local-AI extension pack, plus discovery of locally running inference
//! backends. All operations are parameterized by explicit paths so they can
//! be exercised against temporary directories in tests.

pub mod discovery;
pub mod doctor;
pub mod env_file;
pub mod error;
pub mod fs;
pub mod identity;
pub mod install;
pub mod layout;
pub mod registry;
pub mod switcher;
pub mod uninstall;
pub mod util;
pub mod validate;

/// Re-exports of commonly used types
pub mod prelude {
    // Target layout
    pub use crate::layout::{TargetLayout, TargetStatus};

    // Environment file
    pub use crate::env_file::EnvFile;

    // Discovery
    pub use crate::discovery::{DiscoveryEngine, Provider, ServiceDescriptor};

    // Commands
    pub use crate::doctor::{DoctorCommand, DoctorReport, ToolCheck};
    pub use crate::install::{InstallCommand, InstallOptions, InstallReport};
    pub use crate::switcher::{SwitchCommand, SwitchOptions, SwitchReport};
    pub use crate::uninstall::{
        ComponentKind, UninstallCommand, UninstallMode, UninstallOptions, UninstallReport,
    };
    pub use crate::validate::{CheckStatus, Severity, ValidateCommand, ValidationReport};

    // Backups
    pub use crate::fs::backup::{BackupManifest, BackupStore};

    // Errors
    pub use crate::error::LifecycleError;
}
