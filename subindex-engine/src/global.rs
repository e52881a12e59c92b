// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Process-wide registry handle
//!
//! The registry is installed once at startup. A reload swaps in a new
//! immutable snapshot; requests holding a [`ProjectHandle`] from the
//! previous one finish against it.

use crate::registry::{ProjectHandle, ProjectRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use subindex_core::{IndexError, Result};
use tracing::info;

/// Holder of the current registry snapshot
pub struct RegistryHandle {
    current: RwLock<Option<Arc<ProjectRegistry>>>,
}

impl RegistryHandle {
    pub const fn new() -> Self {
        Self {
            current: parking_lot::const_rwlock(None),
        }
    }

    /// Install the first registry; fails if one is already installed
    pub fn install(&self, registry: Arc<ProjectRegistry>) -> Result<()> {
        let mut current = self.current.write();
        if current.is_some() {
            return Err(IndexError::RegistryAlreadyInstalled);
        }
        info!("Installed project registry ({} projects)", registry.len());
        *current = Some(registry);
        Ok(())
    }

    /// Swap in a new snapshot, returning the previous one
    pub fn reload(&self, registry: Arc<ProjectRegistry>) -> Option<Arc<ProjectRegistry>> {
        info!("Reloaded project registry ({} projects)", registry.len());
        self.current.write().replace(registry)
    }

    pub fn current(&self) -> Result<Arc<ProjectRegistry>> {
        self.current
            .read()
            .clone()
            .ok_or(IndexError::RegistryNotInstalled)
    }

    pub fn is_installed(&self) -> bool {
        self.current.read().is_some()
    }

    /// Resolve a project in the current snapshot, keeping that snapshot
    /// alive while the handle is held
    pub fn resolve(&self, project_id: &str) -> Result<ProjectHandle> {
        self.current()?.checkout(project_id)
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: RegistryHandle = RegistryHandle::new();

/// Install the process-wide registry
pub fn install(registry: Arc<ProjectRegistry>) -> Result<()> {
    GLOBAL.install(registry)
}

/// Atomically replace the process-wide registry
pub fn reload(registry: Arc<ProjectRegistry>) -> Option<Arc<ProjectRegistry>> {
    GLOBAL.reload(registry)
}

/// Current process-wide registry snapshot
pub fn current() -> Result<Arc<ProjectRegistry>> {
    GLOBAL.current()
}

/// Resolve a project in the process-wide registry
pub fn resolve(project_id: &str) -> Result<ProjectHandle> {
    GLOBAL.resolve(project_id)
}
