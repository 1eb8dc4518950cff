//! Board information, sleeping and logging for Lua scripts.
//!
//! ```lua
//! print(sys.BOARD, sys.MCU, sys.VERSION)
//! sys.sleep(0.25)
//! log.info("reading " .. tostring(saul.TSL45315:read()))
//! ```

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::Level;
use mlua::prelude::*;

/// Static facts about the host exposed as `sys.*` constants.
#[derive(Debug, Clone)]
pub struct BoardInfo {
    /// Board name.
    pub board: String,
    /// Microcontroller name.
    pub mcu: String,
}

/// Register the `sys` table.
///
/// - `sys.sleep(seconds)` - Block the script; values <= 0 and NaN return immediately
/// - `sys.BOARD`, `sys.MCU`, `sys.VERSION` - Strings
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register(lua: &Lua, info: &BoardInfo) -> Result<()> {
    let sys_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create sys table: {e}"))?;

    // sys.sleep(seconds)
    let sleep_fn = lua
        .create_function(|_, seconds: f64| {
            if seconds.is_nan() || seconds <= 0.0 {
                return Ok(());
            }
            let duration = Duration::try_from_secs_f64(seconds)
                .map_err(|e| LuaError::runtime(format!("sleep: {e}")))?;
            thread::sleep(duration);
            Ok(())
        })
        .map_err(|e| anyhow!("Failed to create sys.sleep function: {e}"))?;
    sys_table
        .set("sleep", sleep_fn)
        .map_err(|e| anyhow!("Failed to set sys.sleep: {e}"))?;

    for (key, value) in [
        ("BOARD", info.board.as_str()),
        ("MCU", info.mcu.as_str()),
        ("VERSION", env!("CARGO_PKG_VERSION")),
    ] {
        sys_table
            .set(key, value)
            .map_err(|e| anyhow!("Failed to set sys.{key}: {e}"))?;
    }

    lua.globals()
        .set("sys", sys_table)
        .map_err(|e| anyhow!("Failed to register sys table globally: {e}"))?;

    Ok(())
}

/// Register the `log` table routing script messages into the `log` crate.
///
/// Messages use the `lua` target, so `RUST_LOG=lua=debug` shows script
/// debug output without enabling it for the whole crate.
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register_log(lua: &Lua) -> Result<()> {
    let log_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create log table: {e}"))?;

    for (name, level) in [
        ("error", Level::Error),
        ("warn", Level::Warn),
        ("info", Level::Info),
        ("debug", Level::Debug),
    ] {
        let log_fn = lua
            .create_function(move |_, msg: String| {
                log::log!(target: "lua", level, "{}", msg);
                Ok(())
            })
            .map_err(|e| anyhow!("Failed to create log.{name} function: {e}"))?;
        log_table
            .set(name, log_fn)
            .map_err(|e| anyhow!("Failed to set log.{name}: {e}"))?;
    }

    lua.globals()
        .set("log", log_table)
        .map_err(|e| anyhow!("Failed to register log table globally: {e}"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn setup() -> Lua {
        let lua = Lua::new();
        let info = BoardInfo {
            board: "native".to_string(),
            mcu: "native".to_string(),
        };
        register(&lua, &info).expect("Should register sys");
        register_log(&lua).expect("Should register log");
        lua
    }

    #[test]
    fn test_constants() {
        let lua = setup();
        let (board, mcu, version): (String, String, String) = lua
            .load("return sys.BOARD, sys.MCU, sys.VERSION")
            .eval()
            .expect("eval");
        assert_eq!(board, "native");
        assert_eq!(mcu, "native");
        assert_eq!(version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_sleep_blocks() {
        let lua = setup();
        let start = Instant::now();
        lua.load("sys.sleep(0.05)").exec().expect("sleep");
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_sleep_non_positive_returns_immediately() {
        let lua = setup();
        lua.load("sys.sleep(0); sys.sleep(-3); sys.sleep(0/0)")
            .exec()
            .expect("sleep");
    }

    #[test]
    fn test_sleep_rejects_bad_values() {
        let lua = setup();
        assert!(lua.load("sys.sleep(math.huge)").exec().is_err());
        assert!(lua.load(r#"sys.sleep("soon")"#).exec().is_err());
    }

    #[test]
    fn test_log_functions_callable() {
        let lua = setup();
        lua.load(
            r#"
            log.error("test error")
            log.warn("test warn")
            log.info("test info")
            log.debug("test debug")
        "#,
        )
        .exec()
        .expect("log functions should be callable");
    }
}
