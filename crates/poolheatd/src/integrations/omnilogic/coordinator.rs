//! Shared owner of the device tree and the controller client.
//!
//! The coordinator's tree is what every entity reads from. A poller replaces
//! it wholesale through [`Coordinator::update`]; command handlers patch single
//! telemetry fields through [`Coordinator::write`] so the host sees the result
//! of a command before the next poll confirms it.

use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tracing::debug;
use tracing::warn;

use super::api::OmniApi;
use super::model::DeviceTree;

pub struct Coordinator<A: OmniApi> {
    data: RwLock<DeviceTree>,
    api: A,
    last_update_success: AtomicBool,
}

impl<A: OmniApi> Coordinator<A> {
    pub fn new(api: A, data: DeviceTree) -> Self {
        Self {
            data: RwLock::new(data),
            api,
            last_update_success: AtomicBool::new(true),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Read the current tree. The lock is released before this returns.
    pub fn read<R>(&self, f: impl FnOnce(&DeviceTree) -> R) -> R {
        let guard = self
            .data
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&guard)
    }

    /// Mutate the current tree in place. The lock is released before this returns.
    pub fn write<R>(&self, f: impl FnOnce(&mut DeviceTree) -> R) -> R {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Replace the tree with a freshly polled one
    pub fn update(&self, data: DeviceTree) {
        debug!("Device tree refreshed ({} devices)", data.devices.len());
        self.write(|tree| *tree = data);
        self.last_update_success.store(true, Ordering::Release);
    }

    /// Record a failed poll; the stale tree is kept but entities become unavailable
    pub fn update_failed(&self, reason: &str) {
        warn!("Device tree refresh failed: {}", reason);
        self.last_update_success.store(false, Ordering::Release);
    }

    /// Whether the most recent poll succeeded
    pub fn available(&self) -> bool {
        self.last_update_success.load(Ordering::Acquire)
    }
}
