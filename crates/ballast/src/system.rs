//! Unified subsystem entry point
//!
//! Bundles the backup coordinator, restore coordinator, and safe-mode gate
//! over one set of collaborators, sharing the exclusive operation lock.
//! Operator scripts and services all go through this one API so there is a
//! single source of behavior, never parallel reimplementations.

use std::path::Path;
use std::sync::Arc;

use ballast_core::{
    BackupConfig, ContentStore, HealthProbe, Ledger, PrimaryStore, PrimaryStoreProbe,
    SafeModeConfig,
};

use crate::backup::{operation_lock, BackupCoordinator};
use crate::restore::RestoreCoordinator;
use crate::safe_mode::SafeModeGate;

pub struct Ballast {
    backup: BackupCoordinator,
    restore: Arc<RestoreCoordinator>,
    gate: SafeModeGate,
}

impl Ballast {
    /// Wire the subsystem with the primary store's own connectivity check as
    /// the health probe.
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        config: BackupConfig,
        safe_mode_config: SafeModeConfig,
        index_dir: impl AsRef<Path>,
    ) -> Self {
        let probe = Arc::new(PrimaryStoreProbe(primary.clone()));
        Self::with_probe(
            primary,
            content,
            ledger,
            probe,
            config,
            safe_mode_config,
            index_dir,
        )
    }

    /// Wire the subsystem with an injected health probe (fault injection in
    /// tests, external monitors in deployments).
    pub fn with_probe(
        primary: Arc<dyn PrimaryStore>,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        probe: Arc<dyn HealthProbe>,
        config: BackupConfig,
        safe_mode_config: SafeModeConfig,
        index_dir: impl AsRef<Path>,
    ) -> Self {
        let lock = operation_lock();

        let eligible: Vec<String> = config
            .collections
            .iter()
            .filter(|c| c.safe_mode_eligible)
            .map(|c| c.name.clone())
            .collect();

        let backup = BackupCoordinator::new(
            primary.clone(),
            content.clone(),
            ledger.clone(),
            config,
            index_dir,
            lock.clone(),
        );
        let restore = Arc::new(RestoreCoordinator::new(
            primary.clone(),
            content,
            ledger,
            lock,
        ));
        let gate = SafeModeGate::new(
            primary,
            restore.clone(),
            probe,
            safe_mode_config,
            eligible,
        );

        Self {
            backup,
            restore,
            gate,
        }
    }

    pub fn backup(&self) -> &BackupCoordinator {
        &self.backup
    }

    pub fn restore(&self) -> &RestoreCoordinator {
        &self.restore
    }

    pub fn gate(&self) -> &SafeModeGate {
        &self.gate
    }
}
