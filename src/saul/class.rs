//! Device class codes and their symbolic names.
//!
//! Every SAUL driver reports a one-byte class code (`SENSE_TEMP`,
//! `ACT_SERVO`, ...). Scripts only ever see the names, so this module owns
//! the translation in both directions.
//!
//! # Lookup
//!
//! - **By name**: binary search over [`CLASS_TABLE`], which is kept sorted by
//!   name. Names longer than [`MAX_CLASS_NAME_LEN`] are rejected up front.
//! - **By code**: linear scan. Unknown codes render as `"CLASS_UNDEF"`.

use thiserror::Error;

/// Longest class name accepted by [`lookup_by_name`].
pub const MAX_CLASS_NAME_LEN: usize = 64;

/// Name returned by [`lookup_by_code`] when the code is not in the table.
pub const CLASS_UNDEF_NAME: &str = "CLASS_UNDEF";

/// Class code constants.
pub mod code {
    /// Device class is not defined.
    pub const CLASS_UNDEF: u8 = 0x00;
    /// Any actuator (wildcard).
    pub const ACT_ANY: u8 = 0x40;
    /// RGB LED.
    pub const ACT_LED_RGB: u8 = 0x42;
    /// Servo motor.
    pub const ACT_SERVO: u8 = 0x43;
    /// Motor.
    pub const ACT_MOTOR: u8 = 0x44;
    /// On/off switch.
    pub const ACT_SWITCH: u8 = 0x45;
    /// Dimmer.
    pub const ACT_DIMMER: u8 = 0x46;
    /// Any sensor (wildcard).
    pub const SENSE_ANY: u8 = 0x80;
    /// Button.
    pub const SENSE_BTN: u8 = 0x81;
    /// Temperature.
    pub const SENSE_TEMP: u8 = 0x82;
    /// Humidity.
    pub const SENSE_HUM: u8 = 0x83;
    /// Ambient light.
    pub const SENSE_LIGHT: u8 = 0x84;
    /// Accelerometer.
    pub const SENSE_ACCEL: u8 = 0x85;
    /// Magnetometer.
    pub const SENSE_MAG: u8 = 0x86;
    /// Gyroscope.
    pub const SENSE_GYRO: u8 = 0x87;
    /// Color.
    pub const SENSE_COLOR: u8 = 0x88;
    /// Pressure.
    pub const SENSE_PRESS: u8 = 0x89;
    /// Raw ADC reading.
    pub const SENSE_ANALOG: u8 = 0x8a;
    /// UV index.
    pub const SENSE_UV: u8 = 0x8b;
    /// Object temperature.
    pub const SENSE_OBJTEMP: u8 = 0x8c;
    /// Pulse counter.
    pub const SENSE_COUNT: u8 = 0x8d;
    /// Distance.
    pub const SENSE_DISTANCE: u8 = 0x8e;
    /// CO2 concentration.
    pub const SENSE_CO2: u8 = 0x8f;
    /// Volatile organic compounds.
    pub const SENSE_TVOC: u8 = 0x90;
    /// Occupancy.
    pub const SENSE_OCCUP: u8 = 0x91;
    /// Any class (wildcard).
    pub const CLASS_ANY: u8 = 0xff;
}

/// One `(name, code)` pair of the class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassEntry {
    /// Symbolic name, as seen by scripts.
    pub name: &'static str,
    /// Driver class code.
    pub code: u8,
}

const fn entry(name: &'static str, code: u8) -> ClassEntry {
    ClassEntry { name, code }
}

/// All known classes. Must stay sorted by `name` (byte order).
pub static CLASS_TABLE: [ClassEntry; 26] = [
    entry("ACT_ANY", code::ACT_ANY),
    entry("ACT_DIMMER", code::ACT_DIMMER),
    entry("ACT_LED_RGB", code::ACT_LED_RGB),
    entry("ACT_MOTOR", code::ACT_MOTOR),
    entry("ACT_SERVO", code::ACT_SERVO),
    entry("ACT_SWITCH", code::ACT_SWITCH),
    entry("CLASS_ANY", code::CLASS_ANY),
    entry("CLASS_UNDEF", code::CLASS_UNDEF),
    entry("SENSE_ACCEL", code::SENSE_ACCEL),
    entry("SENSE_ANALOG", code::SENSE_ANALOG),
    entry("SENSE_ANY", code::SENSE_ANY),
    entry("SENSE_BTN", code::SENSE_BTN),
    entry("SENSE_CO2", code::SENSE_CO2),
    entry("SENSE_COLOR", code::SENSE_COLOR),
    entry("SENSE_COUNT", code::SENSE_COUNT),
    entry("SENSE_DISTANCE", code::SENSE_DISTANCE),
    entry("SENSE_GYRO", code::SENSE_GYRO),
    entry("SENSE_HUM", code::SENSE_HUM),
    entry("SENSE_LIGHT", code::SENSE_LIGHT),
    entry("SENSE_MAG", code::SENSE_MAG),
    entry("SENSE_OBJTEMP", code::SENSE_OBJTEMP),
    entry("SENSE_OCCUP", code::SENSE_OCCUP),
    entry("SENSE_PRESS", code::SENSE_PRESS),
    entry("SENSE_TEMP", code::SENSE_TEMP),
    entry("SENSE_TVOC", code::SENSE_TVOC),
    entry("SENSE_UV", code::SENSE_UV),
];

/// Why a name lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassLookupError {
    /// The name is not in the table.
    #[error("Unknown device type")]
    NotFound,
    /// The name exceeds [`MAX_CLASS_NAME_LEN`].
    #[error("Device type name too long ({0} bytes, max 64)")]
    NameTooLong(usize),
}

/// Resolve a class name to its code.
pub fn lookup_by_name(name: &str) -> Result<u8, ClassLookupError> {
    if name.len() > MAX_CLASS_NAME_LEN {
        return Err(ClassLookupError::NameTooLong(name.len()));
    }

    CLASS_TABLE
        .binary_search_by(|e| e.name.as_bytes().cmp(name.as_bytes()))
        .map(|idx| CLASS_TABLE[idx].code)
        .map_err(|_insert_at| ClassLookupError::NotFound)
}

/// Resolve a class code to its name, falling back to `"CLASS_UNDEF"`.
pub fn lookup_by_code(code: u8) -> &'static str {
    CLASS_TABLE
        .iter()
        .find(|e| e.code == code)
        .map_or(CLASS_UNDEF_NAME, |e| e.name)
}

/// Iterate every class name in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    CLASS_TABLE.iter().map(|e| e.name)
}
