//! Process-wide driver selection
//!
//! New sessions are created through whichever [`Driver`] is installed here.
//! Builds with the `flycapture` feature default to the vendor SDK, all
//! others to the simulator. Sessions already open keep the context they were
//! created with when the driver is swapped.

use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use pgrcam_core::{Driver, Result, SimConfig, SimDriver};
use tracing::info;

lazy_static! {
    static ref DRIVER: RwLock<Arc<dyn Driver>> = RwLock::new(default_driver());
}

#[cfg(feature = "flycapture")]
fn default_driver() -> Arc<dyn Driver> {
    Arc::new(pgrcam_core::FlyCaptureDriver)
}

#[cfg(not(feature = "flycapture"))]
fn default_driver() -> Arc<dyn Driver> {
    Arc::new(SimDriver::default())
}

/// The driver new sessions are created with.
pub fn current() -> Arc<dyn Driver> {
    Arc::clone(&DRIVER.read())
}

pub fn install(driver: Arc<dyn Driver>) {
    info!(driver = driver.name(), "installed capture driver");
    *DRIVER.write() = driver;
}

/// Install a simulator built from a JSON [`SimConfig`].
pub fn install_simulator(json: &str) -> Result<SimDriver> {
    let driver = SimDriver::new(SimConfig::from_json(json)?);
    install(Arc::new(driver.clone()));
    Ok(driver)
}

/// Put the build's default driver back.
pub fn reset() {
    install(default_driver());
}
