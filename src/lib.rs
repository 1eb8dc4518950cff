//! devbridge - Lua bindings for SAUL devices and UDP sockets.
//!
//! Scripts see three globals:
//!
//! - `saul` - look up sensors/actuators by name or class, read and write
//!   fixed-point values as plain numbers
//! - `socket` - UDP sockets with endpoint parsing and errno-based messages
//! - `sys` - board constants and `sleep`
//!
//! # Modules
//!
//! - [`saul`] - device registry, class table, value codec, simulated drivers
//! - [`net`] - endpoints, socket errors, the UDP stack
//! - [`lua`] - runtime, primitives, handle cache, REPL
//! - [`config`] - configuration loading/saving

pub mod config;
pub mod lua;
pub mod net;
pub mod saul;

pub use config::{Config, DeviceConfig};
pub use lua::LuaRuntime;
