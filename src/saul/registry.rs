//! In-memory SAUL device registry.
//!
//! The registry owns every [`SaulDevice`]. Script bindings only look devices
//! up and keep shared references; dropping a script handle never unregisters
//! or tears down a device.
//!
//! # Thread Safety
//!
//! Devices are usually registered by the host before any script runs, and
//! possibly from another thread, so the device list sits behind an `RwLock`.
//! Lookups return cloned `Arc`s and never hold the lock across driver calls.

use std::fmt;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::class;
use super::phydat::{Phydat, PHYDAT_DIM};

/// Negative status code returned by a driver.
///
/// Rendered as `"error <code>"`, which is also what scripts see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("error {0}")]
pub struct DriverError(pub i32);

impl DriverError {
    /// The driver does not implement this direction (read or write).
    pub const NOT_SUPPORTED: Self = Self(-libc::ENOTSUP);

    /// The raw (negative) status code.
    #[must_use]
    pub fn code(self) -> i32 {
        self.0
    }
}

/// Driver interface of a registered device.
pub trait SaulDriver: fmt::Debug + Send + Sync {
    /// Class code (see [`class::code`]).
    fn class(&self) -> u8;

    /// Fill `data` and return how many values are valid (1 to 3).
    fn read(&self, data: &mut Phydat) -> Result<usize, DriverError>;

    /// Apply `data` and return how many values were consumed.
    fn write(&self, data: &Phydat) -> Result<usize, DriverError>;
}

/// A named device bound to its driver.
#[derive(Debug)]
pub struct SaulDevice {
    name: String,
    driver: Arc<dyn SaulDriver>,
}

impl SaulDevice {
    /// Create a device. It is not visible to lookups until added to a registry.
    pub fn new(name: impl Into<String>, driver: Arc<dyn SaulDriver>) -> Self {
        Self {
            name: name.into(),
            driver,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver class code.
    pub fn class(&self) -> u8 {
        self.driver.class()
    }

    /// Driver class rendered as a name.
    pub fn class_name(&self) -> &'static str {
        class::lookup_by_code(self.class())
    }

    /// Read the device. The exponent starts at 0 and the count is clamped to 3.
    pub fn read(&self) -> Result<(Phydat, usize), DriverError> {
        let mut data = Phydat::default();
        let count = self.driver.read(&mut data)?;
        Ok((data, count.min(PHYDAT_DIM)))
    }

    /// Write to the device.
    pub fn write(&self, data: &Phydat) -> Result<usize, DriverError> {
        self.driver.write(data)
    }
}

/// Ordered collection of registered devices.
///
/// Lookups return the first match in registration order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Arc<SaulDevice>>>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device and return the shared reference stored in the registry.
    pub fn add(&self, device: SaulDevice) -> Arc<SaulDevice> {
        let device = Arc::new(device);
        if let Ok(mut devices) = self.devices.write() {
            log::debug!(
                "Registered device {} ({})",
                device.name(),
                device.class_name()
            );
            devices.push(Arc::clone(&device));
        }
        device
    }

    /// Unregister the first device with this name.
    ///
    /// Returns true if a device was removed. Outstanding references stay valid.
    pub fn remove(&self, name: &str) -> bool {
        let Ok(mut devices) = self.devices.write() else {
            return false;
        };
        if let Some(idx) = devices.iter().position(|d| d.name() == name) {
            devices.remove(idx);
            true
        } else {
            false
        }
    }

    /// First device with this exact name.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<Arc<SaulDevice>> {
        self.devices
            .read()
            .ok()?
            .iter()
            .find(|d| d.name() == name)
            .cloned()
    }

    /// First device whose driver reports this exact class code.
    #[must_use]
    pub fn find_by_type(&self, code: u8) -> Option<Arc<SaulDevice>> {
        self.devices
            .read()
            .ok()?
            .iter()
            .find(|d| d.class() == code)
            .cloned()
    }

    /// All devices in registration order.
    ///
    /// Returns empty vec if lock is poisoned.
    #[must_use]
    pub fn devices(&self) -> Vec<Arc<SaulDevice>> {
        self.devices
            .read()
            .map(|devices| devices.clone())
            .unwrap_or_default()
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.read().map(|d| d.len()).unwrap_or(0)
    }

    /// Check if no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saul::class::code;
    use crate::saul::simulated::SimulatedDriver;

    fn registry() -> DeviceRegistry {
        let reg = DeviceRegistry::new();
        reg.add(SaulDevice::new(
            "Servomotor",
            Arc::new(SimulatedDriver::actuator(code::ACT_SERVO, 1)),
        ));
        reg.add(SaulDevice::new(
            "TSL45315",
            Arc::new(SimulatedDriver::sensor(code::SENSE_LIGHT, &[120.0]).expect("valid reading")),
        ));
        reg.add(SaulDevice::new(
            "TSL45315-b",
            Arc::new(SimulatedDriver::sensor(code::SENSE_LIGHT, &[80.0]).expect("valid reading")),
        ));
        reg
    }

    #[test]
    fn test_find_by_name() {
        let reg = registry();
        let dev = reg.find_by_name("Servomotor").expect("servo registered");
        assert_eq!(dev.name(), "Servomotor");
        assert_eq!(dev.class_name(), "ACT_SERVO");
        assert!(reg.find_by_name("servomotor").is_none());
    }

    #[test]
    fn test_find_by_type_returns_first_match() {
        let reg = registry();
        let dev = reg.find_by_type(code::SENSE_LIGHT).expect("light sensor");
        assert_eq!(dev.name(), "TSL45315");
        assert!(reg.find_by_type(code::SENSE_TEMP).is_none());
    }

    #[test]
    fn test_lookups_share_the_same_device() {
        let reg = registry();
        let a = reg.find_by_name("TSL45315").expect("device");
        let b = reg.find_by_type(code::SENSE_LIGHT).expect("device");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_remove_keeps_outstanding_references() {
        let reg = registry();
        let dev = reg.find_by_name("TSL45315").expect("device");
        assert!(reg.remove("TSL45315"));
        assert!(!reg.remove("TSL45315"));
        assert_eq!(reg.len(), 2);
        // The removed device is still readable through the old reference.
        let (_, count) = dev.read().expect("read should still work");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_read_not_supported() {
        let reg = registry();
        let servo = reg.find_by_name("Servomotor").expect("servo");
        let err = servo.read().expect_err("servo is write-only");
        assert_eq!(err, DriverError::NOT_SUPPORTED);
        assert_eq!(err.to_string(), format!("error {}", -libc::ENOTSUP));
    }

    #[test]
    fn test_empty_registry() {
        let reg = DeviceRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.devices().is_empty());
        assert!(reg.find_by_name("anything").is_none());
    }
}
