//! SAUL device primitives for Lua scripts.
//!
//! # Usage in Lua
//!
//! ```lua
//! local servo = saul.Servomotor            -- lookup by name, nil if absent
//! local light = saul.find_type("SENSE_LIGHT")
//!
//! print(light:get_name(), light:get_type())
//! local lux = light:read()                 -- 1 to 3 numbers, or nil, "error <code>"
//! servo:write(90)                          -- count, or nil, "error <code>"
//!
//! for i, name in ipairs(saul.types()) do print(i, name) end
//! for _, dev in ipairs(saul.devices()) do print(dev) end
//! ```
//!
//! Handles are shared: every lookup of the same device returns the same
//! userdata while any script still references it (see [`HandleCache`]).

use std::sync::Arc;

use anyhow::{anyhow, Result};
use mlua::prelude::*;

use super::nil_and_message;
use crate::lua::handle_cache::HandleCache;
use crate::saul::{class, phydat, DeviceRegistry, SaulDevice};

/// Script-side view of a registered device.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    device: Arc<SaulDevice>,
}

impl DeviceHandle {
    /// Wrap a device.
    pub fn new(device: Arc<SaulDevice>) -> Self {
        Self { device }
    }

    /// The wrapped device.
    pub fn device(&self) -> &Arc<SaulDevice> {
        &self.device
    }
}

impl LuaUserData for DeviceHandle {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // dev:get_name() -> string
        methods.add_method("get_name", |_, this, ()| Ok(this.device.name().to_string()));

        // dev:get_type() -> class name
        methods.add_method("get_type", |_, this, ()| Ok(this.device.class_name()));

        // dev:read() -> v1[, v2[, v3]] | nil, "error <code>"
        methods.add_method("read", |lua, this, ()| match this.device.read() {
            Ok((data, count)) => phydat::decode(&data, count)
                .into_iter()
                .collect::<LuaVariadic<f64>>()
                .into_lua_multi(lua),
            Err(e) => nil_and_message(lua, e),
        });

        // dev:write(v1[, v2[, v3]]) -> count | nil, "error <code>"
        methods.add_method("write", |lua, this, values: LuaVariadic<f64>| {
            let data = phydat::encode(&values)
                .map_err(|e| LuaError::runtime(format!("saul write: {e}")))?;
            match this.device.write(&data) {
                Ok(count) => count.into_lua_multi(lua),
                Err(e) => nil_and_message(lua, e),
            }
        });

        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            Ok(format!("saul_dev: {}", this.device.name()))
        });
    }
}

/// Register the `saul` table.
///
/// Creates a global `saul` table with:
/// - `saul.find_type(name)` - First device of a class, nil if none
/// - `saul.types()` - All class names
/// - `saul.devices()` - Handles for every registered device
/// - `saul.<name>` - Device by name, nil if none
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register(lua: &Lua, registry: Arc<DeviceRegistry>, cache: HandleCache) -> Result<()> {
    let saul_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create saul table: {e}"))?;

    // saul.find_type(name)
    let reg = Arc::clone(&registry);
    let handles = cache.clone();
    let find_type_fn = lua
        .create_function(move |lua, name: String| {
            let code = class::lookup_by_name(&name)
                .map_err(|e| LuaError::runtime(format!("{e}: {name}")))?;
            handles.wrap(lua, reg.find_by_type(code))
        })
        .map_err(|e| anyhow!("Failed to create saul.find_type function: {e}"))?;
    saul_table
        .set("find_type", find_type_fn)
        .map_err(|e| anyhow!("Failed to set saul.find_type: {e}"))?;

    // saul.types()
    let types_fn = lua
        .create_function(|lua, ()| lua.create_sequence_from(class::names()))
        .map_err(|e| anyhow!("Failed to create saul.types function: {e}"))?;
    saul_table
        .set("types", types_fn)
        .map_err(|e| anyhow!("Failed to set saul.types: {e}"))?;

    // saul.devices()
    let reg = Arc::clone(&registry);
    let handles = cache.clone();
    let devices_fn = lua
        .create_function(move |lua, ()| {
            let list = lua.create_table()?;
            for (i, device) in reg.devices().into_iter().enumerate() {
                list.raw_set(i + 1, handles.wrap(lua, Some(device))?)?;
            }
            Ok(list)
        })
        .map_err(|e| anyhow!("Failed to create saul.devices function: {e}"))?;
    saul_table
        .set("devices", devices_fn)
        .map_err(|e| anyhow!("Failed to set saul.devices: {e}"))?;

    // saul.<name> falls through to a registry lookup.
    let index_fn = lua
        .create_function(move |lua, (_, key): (LuaTable, LuaValue)| {
            let LuaValue::String(name) = key else {
                return Ok(LuaNil);
            };
            let Ok(name) = name.to_str() else {
                return Ok(LuaNil);
            };
            cache.wrap(lua, registry.find_by_name(&name))
        })
        .map_err(|e| anyhow!("Failed to create saul.__index function: {e}"))?;
    let meta = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create saul metatable: {e}"))?;
    meta.set("__index", index_fn)
        .map_err(|e| anyhow!("Failed to set saul.__index: {e}"))?;
    saul_table.set_metatable(Some(meta));

    lua.globals()
        .set("saul", saul_table)
        .map_err(|e| anyhow!("Failed to register saul table globally: {e}"))?;

    Ok(())
}
