//! Sensor/actuator device layer (SAUL).
//!
//! - [`class`] - class code table (name <-> code)
//! - [`phydat`] - fixed-point value codec
//! - [`registry`] - device registry and driver trait
//! - [`simulated`] - in-memory drivers for hosts without hardware

pub mod class;
pub mod phydat;
pub mod registry;
pub mod simulated;

pub use phydat::{Phydat, PhydatError};
pub use registry::{DeviceRegistry, DriverError, SaulDevice, SaulDriver};
pub use simulated::SimulatedDriver;
