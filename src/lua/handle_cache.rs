//! Identity-preserving cache of device handles.
//!
//! Looking up the same device twice from a script must yield the same
//! userdata, so scripts can compare handles with `==` and use them as table
//! keys. The cache is a Lua table with weak values, keyed by the device's
//! address as light userdata: once a script drops its last reference to a
//! handle, the collector clears the entry and the next lookup builds a fresh
//! handle.
//!
//! A cached handle owns an `Arc` to its device, so the address used as key
//! cannot be reused by another device while the entry is alive.

use std::ffi::c_void;
use std::sync::Arc;

use mlua::prelude::*;

use super::primitives::saul::DeviceHandle;
use crate::saul::SaulDevice;

/// Registry key under which the weak table is stored.
const CACHE_REGISTRY_KEY: &str = "devbridge.handle_cache";

/// Weak-valued map from device identity to its script handle.
#[derive(Debug, Clone)]
pub struct HandleCache {
    table: LuaTable,
}

impl HandleCache {
    /// Create the weak table and anchor it in the Lua registry.
    pub fn new(lua: &Lua) -> LuaResult<Self> {
        let table = lua.create_table()?;
        let mt = lua.create_table()?;
        mt.set("__mode", "v")?;
        table.set_metatable(Some(mt));
        lua.set_named_registry_value(CACHE_REGISTRY_KEY, &table)?;
        Ok(Self { table })
    }

    /// Return the handle for `device`, creating it on first use.
    ///
    /// `None` maps to nil.
    pub fn wrap(&self, lua: &Lua, device: Option<Arc<SaulDevice>>) -> LuaResult<LuaValue> {
        let Some(device) = device else {
            return Ok(LuaNil);
        };

        let key = LuaLightUserData(Arc::as_ptr(&device).cast_mut().cast::<c_void>());
        let cached: LuaValue = self.table.raw_get(key)?;
        if !cached.is_nil() {
            log::debug!("Handle cache hit for {}", device.name());
            return Ok(cached);
        }

        log::debug!("Handle cache miss for {}", device.name());
        let handle = lua.create_userdata(DeviceHandle::new(device))?;
        self.table.raw_set(key, handle.clone())?;
        Ok(LuaValue::UserData(handle))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.pairs::<LuaValue, LuaValue>().count()
    }

    /// Check if no handle is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saul::class::code;
    use crate::saul::SimulatedDriver;

    fn device(name: &str) -> Arc<SaulDevice> {
        Arc::new(SaulDevice::new(
            name,
            Arc::new(SimulatedDriver::actuator(code::ACT_SWITCH, 1)),
        ))
    }

    #[test]
    fn test_none_is_nil() {
        let lua = Lua::new();
        let cache = HandleCache::new(&lua).expect("Should create cache");
        let value = cache.wrap(&lua, None).expect("wrap");
        assert!(value.is_nil());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_same_device_same_handle() {
        let lua = Lua::new();
        let cache = HandleCache::new(&lua).expect("Should create cache");
        let dev = device("relay");

        let a = cache.wrap(&lua, Some(Arc::clone(&dev))).expect("wrap");
        let b = cache.wrap(&lua, Some(Arc::clone(&dev))).expect("wrap");
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);

        let other = cache.wrap(&lua, Some(device("relay"))).expect("wrap");
        assert_ne!(a, other);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_identity_visible_to_scripts() {
        let lua = Lua::new();
        let cache = HandleCache::new(&lua).expect("Should create cache");
        let dev = device("relay");

        lua.globals()
            .set("a", cache.wrap(&lua, Some(Arc::clone(&dev))).expect("wrap"))
            .expect("set a");
        lua.globals()
            .set("b", cache.wrap(&lua, Some(dev)).expect("wrap"))
            .expect("set b");

        let same: bool = lua.load("return rawequal(a, b)").eval().expect("eval");
        assert!(same);
    }

    #[test]
    fn test_unreferenced_handles_are_evicted() {
        let lua = Lua::new();
        let cache = HandleCache::new(&lua).expect("Should create cache");
        let dev = device("relay");

        lua.globals()
            .set("h", cache.wrap(&lua, Some(Arc::clone(&dev))).expect("wrap"))
            .expect("set h");
        assert_eq!(cache.len(), 1);

        lua.load("h = nil").exec().expect("clear h");
        lua.gc_collect().expect("gc");
        lua.gc_collect().expect("gc");
        assert!(cache.is_empty());

        // Eviction drops the handle's reference only; the device lives on.
        assert_eq!(Arc::strong_count(&dev), 1);
        let again = cache.wrap(&lua, Some(Arc::clone(&dev))).expect("wrap");
        let LuaValue::UserData(handle) = &again else {
            panic!("expected a handle, got {again:?}");
        };
        assert!(Arc::ptr_eq(
            handle.borrow::<DeviceHandle>().expect("device handle").device(),
            &dev
        ));
        assert_eq!(cache.len(), 1);

        lua.globals().set("h", again).expect("set h");
        let name: String = lua.load("return h:get_name()").eval().expect("eval");
        assert_eq!(name, "relay");
    }
}
