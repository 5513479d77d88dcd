//! Trading-rights rotation across cooperating instances
//!
//! A single small textual token in a shared location names the instance
//! that currently owns trading rights. There is no locking primitive over
//! the store, so ownership is re-read every bar-close and never cached;
//! writes are last-write-wins. Handoff happens only after a completed
//! round trip (entry fill followed by return to flat); a cancelled,
//! never-filled entry keeps control.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::StrategyError;

/// Narrow interface over the shared token store.
pub trait OwnerStore {
    fn read_owner(&self) -> io::Result<u32>;
    fn write_owner(&self, owner: u32) -> io::Result<()>;
}

/// Token stored as a single integer in a text file visible to every
/// cooperating instance.
#[derive(Debug, Clone)]
pub struct FileOwnerStore {
    path: PathBuf,
}

impl FileOwnerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileOwnerStore { path: path.into() }
    }

    /// Create the token file with owner `1` if it does not exist yet.
    pub fn ensure_initialized(&self) -> io::Result<()> {
        if !self.path.exists() {
            fs::write(&self.path, "1")?;
            info!(path = %self.path.display(), "created rotation token, owner 1");
        }
        Ok(())
    }
}

impl OwnerStore for FileOwnerStore {
    fn read_owner(&self) -> io::Result<u32> {
        let text = fs::read_to_string(&self.path)?;
        // unparsable content falls back to instance 1 rather than halting
        Ok(text.trim().parse().unwrap_or(1))
    }

    fn write_owner(&self, owner: u32) -> io::Result<()> {
        fs::write(&self.path, owner.to_string())
    }
}

/// Whether this instance may trade on the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Active,
    Waiting,
}

/// Decides this instance's role from the shared token and hands rights to
/// the next instance after a completed round trip.
#[derive(Debug, Clone)]
pub struct RotationArbiter {
    instance_index: u32,
    instances: u32,
}

impl RotationArbiter {
    pub fn new(instance_index: u32, instances: u32) -> Self {
        RotationArbiter {
            instance_index,
            instances,
        }
    }

    /// Re-read the token. A read failure means Waiting: never assume
    /// ownership on error.
    pub fn poll(&self, store: &dyn OwnerStore) -> Role {
        match store.read_owner() {
            Ok(owner) if owner == self.instance_index => Role::Active,
            Ok(owner) => {
                debug!(
                    owner,
                    instance = self.instance_index,
                    "waiting for trading rights"
                );
                Role::Waiting
            }
            Err(e) => {
                warn!(error = %e, "rotation token read failed, staying waiting");
                Role::Waiting
            }
        }
    }

    /// Hand trading rights to the next instance in the cycle.
    pub fn rotate(&self, store: &dyn OwnerStore) -> Result<(), StrategyError> {
        let next = self.instance_index % self.instances + 1;
        store.write_owner(next)?;
        info!(
            instance = self.instance_index,
            next, "round trip complete, rotating trading rights"
        );
        Ok(())
    }
}
