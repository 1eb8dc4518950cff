//! Lua primitive functions exposed to scripts.
//!
//! Primitives are registered when the Lua runtime is created.
//!
//! # Available Primitives
//!
//! - `saul` - Device lookup by name or class, device read/write
//! - `socket` - UDP sockets (udp, send, recv, close)
//! - `sys` - Board constants and sleep
//! - `log` - Logging functions (error, warn, info, debug)
//!
//! # Conventions
//!
//! Operational failures are returned as `nil, message` so scripts can use
//! `assert(...)` or branch on the second value. Raising is reserved for
//! calls with arguments of the wrong type or shape.

pub mod endpoint;
pub mod saul;
pub mod socket;
pub mod sys;

use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;
use mlua::prelude::*;

pub use saul::DeviceHandle;
pub use socket::LuaUdpSocket;
pub use sys::BoardInfo;

use super::handle_cache::HandleCache;
use crate::net::DatagramStack;
use crate::saul::DeviceRegistry;

/// The `nil, message` pair returned for operational failures.
pub(crate) fn nil_and_message(lua: &Lua, msg: impl Display) -> LuaResult<LuaMultiValue> {
    (LuaNil, msg.to_string()).into_lua_multi(lua)
}

/// Register every primitive with the Lua state.
///
/// # Errors
///
/// Returns an error if any primitive registration fails.
pub fn register_all(
    lua: &Lua,
    registry: Arc<DeviceRegistry>,
    cache: HandleCache,
    stack: Arc<dyn DatagramStack>,
    info: &BoardInfo,
) -> Result<()> {
    sys::register_log(lua)?;
    sys::register(lua, info)?;
    saul::register(lua, registry, cache)?;
    socket::register(lua, stack)?;
    Ok(())
}
