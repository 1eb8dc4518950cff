//! Simulated drivers for hosts without real hardware.
//!
//! A simulated device keeps its last value in memory: reads return it,
//! writes replace it. Either direction can be disabled to mimic write-only
//! actuators (servos) or read-only sensors, which then fail with
//! [`DriverError::NOT_SUPPORTED`].

use std::sync::Mutex;

use super::phydat::{self, Phydat, PhydatError, PHYDAT_DIM};
use super::registry::{DriverError, SaulDriver};

#[derive(Debug, Default)]
struct SimulatedState {
    data: Phydat,
    writes: usize,
}

/// In-memory driver that echoes back the last written value.
#[derive(Debug)]
pub struct SimulatedDriver {
    class: u8,
    /// Number of values produced by reads and consumed by writes.
    dim: usize,
    readable: bool,
    writable: bool,
    state: Mutex<SimulatedState>,
}

impl SimulatedDriver {
    /// Driver that supports both reads and writes.
    pub fn new(class: u8, initial: &[f64]) -> Result<Self, PhydatError> {
        let data = phydat::encode(initial)?;
        Ok(Self {
            class,
            dim: initial.len(),
            readable: true,
            writable: true,
            state: Mutex::new(SimulatedState { data, writes: 0 }),
        })
    }

    /// Read-only sensor reporting `initial`.
    pub fn sensor(class: u8, initial: &[f64]) -> Result<Self, PhydatError> {
        Ok(Self {
            writable: false,
            ..Self::new(class, initial)?
        })
    }

    /// Write-only actuator consuming `dim` values per write (clamped to 1..=3).
    pub fn actuator(class: u8, dim: usize) -> Self {
        Self {
            class,
            dim: dim.clamp(1, PHYDAT_DIM),
            readable: false,
            writable: true,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    /// Last value held by the device (initial or last written).
    pub fn current(&self) -> Phydat {
        self.state
            .lock()
            .expect("simulated driver state mutex poisoned")
            .data
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .expect("simulated driver state mutex poisoned")
            .writes
    }
}

impl SaulDriver for SimulatedDriver {
    fn class(&self) -> u8 {
        self.class
    }

    fn read(&self, data: &mut Phydat) -> Result<usize, DriverError> {
        if !self.readable {
            return Err(DriverError::NOT_SUPPORTED);
        }
        *data = self.current();
        Ok(self.dim)
    }

    fn write(&self, data: &Phydat) -> Result<usize, DriverError> {
        if !self.writable {
            return Err(DriverError::NOT_SUPPORTED);
        }
        let mut state = self
            .state
            .lock()
            .expect("simulated driver state mutex poisoned");
        state.data = *data;
        state.writes += 1;
        Ok(self.dim)
    }
}
