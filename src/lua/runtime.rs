//! Lua runtime management.
//!
//! Provides the `LuaRuntime` struct which owns the Lua interpreter state,
//! wires the device registry and socket stack into it, and runs scripts with
//! strict or lenient error handling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use mlua::prelude::*;

use super::handle_cache::HandleCache;
use super::primitives;
use crate::config::Config;
use crate::net::{DatagramStack, StdDatagramStack};
use crate::saul::DeviceRegistry;

/// Lua scripting runtime.
///
/// Owns the Lua interpreter state. The state is not `Send`; keep the runtime
/// on the thread that created it.
///
/// # Strict Mode
///
/// With `strict` set (config or `DEVBRIDGE_STRICT=1`), script errors from
/// `load_file` and `load_string` propagate to the caller. Otherwise they are
/// logged and the call returns `Ok(())`.
///
/// # Example
///
/// ```ignore
/// let config = Config::load()?;
/// let runtime = LuaRuntime::from_config(&config)?;
/// runtime.load_string("blink", "saul.Servomotor:write(90)")?;
/// ```
pub struct LuaRuntime {
    /// The Lua interpreter state.
    lua: Lua,
    /// Whether to propagate script errors.
    strict: bool,
    /// Directory for `require` and relative script paths.
    script_dir: Option<PathBuf>,
    /// Devices visible through `saul`.
    registry: Arc<DeviceRegistry>,
    /// Identity cache backing `saul` handles.
    handle_cache: HandleCache,
}

impl std::fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("strict", &self.strict)
            .field("script_dir", &self.script_dir)
            .field("devices", &self.registry.len())
            .field("cached_handles", &self.handle_cache.len())
            .finish_non_exhaustive()
    }
}

impl LuaRuntime {
    /// Create a runtime with primitives registered.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The handle cache cannot be created
    /// - Primitive registration fails
    /// - `package.path` cannot be updated
    pub fn new(
        config: &Config,
        registry: Arc<DeviceRegistry>,
        stack: Arc<dyn DatagramStack>,
    ) -> Result<Self> {
        let lua = Lua::new();

        let handle_cache =
            HandleCache::new(&lua).map_err(|e| anyhow!("Failed to create handle cache: {e}"))?;

        primitives::register_all(
            &lua,
            Arc::clone(&registry),
            handle_cache.clone(),
            stack,
            &config.board_info(),
        )
        .context("Failed to register Lua primitives")?;

        if let Some(dir) = &config.script_dir {
            Self::setup_package_path(&lua, dir)?;
        }

        log::debug!(
            "Lua runtime created (devices={}, strict={})",
            registry.len(),
            config.strict
        );

        Ok(Self {
            lua,
            strict: config.strict,
            script_dir: config.script_dir.clone(),
            registry,
            handle_cache,
        })
    }

    /// Create a runtime with the configured simulated devices and the host
    /// UDP stack.
    ///
    /// # Errors
    ///
    /// Returns an error if a device entry is invalid or runtime creation fails.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = Arc::new(config.build_registry()?);
        Self::new(config, registry, Arc::new(StdDatagramStack::new()))
    }

    /// Configure Lua package.path so `require("foo")` finds
    /// `{dir}/foo.lua` and `{dir}/foo/init.lua`.
    fn setup_package_path(lua: &Lua, dir: &Path) -> Result<()> {
        let package: LuaTable = lua
            .globals()
            .get("package")
            .map_err(|e| anyhow!("Failed to get package table: {e}"))?;

        let current_path: String = package
            .get("path")
            .map_err(|e| anyhow!("Failed to get package.path: {e}"))?;

        let new_path = format!(
            "{path}/?.lua;{path}/?/init.lua;{current}",
            path = dir.display(),
            current = current_path
        );

        package
            .set("path", new_path)
            .map_err(|e| anyhow!("Failed to set package.path: {e}"))?;

        Ok(())
    }

    /// Resolve a script path: as given if it exists, else under `script_dir`.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_relative() && !path.exists() {
            if let Some(dir) = &self.script_dir {
                return dir.join(path);
            }
        }
        path.to_path_buf()
    }

    /// Load and execute a Lua file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The Lua code has syntax errors
    /// - The Lua code throws an error during execution
    ///
    /// In strict mode, errors propagate up.
    /// In non-strict mode, errors are logged and `Ok(())` is returned.
    pub fn load_file(&self, path: &Path) -> Result<()> {
        let full_path = self.resolve(path);

        match self.load_file_internal(&full_path) {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.strict {
                    Err(e)
                } else {
                    log::warn!("Lua file error ({}): {}", full_path.display(), e);
                    Ok(())
                }
            }
        }
    }

    /// Internal file loading that always returns errors.
    fn load_file_internal(&self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read Lua file: {}", path.display()))?;

        self.lua
            .load(source.as_str())
            .set_name(format!("@{}", path.display()))
            .exec()
            .map_err(|e| anyhow!("Failed to execute Lua file {}: {}", path.display(), e))?;

        log::debug!("Loaded Lua file: {}", path.display());
        Ok(())
    }

    /// Load and execute Lua code from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the Lua code fails to parse or execute and the
    /// runtime is strict.
    pub fn load_string(&self, name: &str, source: &str) -> Result<()> {
        match self.load_string_internal(name, source) {
            Ok(()) => Ok(()),
            Err(e) => {
                if self.strict {
                    Err(e)
                } else {
                    log::warn!("Lua error ({}): {}", name, e);
                    Ok(())
                }
            }
        }
    }

    /// Internal string loading that always returns errors.
    fn load_string_internal(&self, name: &str, source: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(name)
            .exec()
            .map_err(|e| anyhow!("Failed to execute Lua {}: {}", name, e))?;

        log::debug!("Loaded Lua: {}", name);
        Ok(())
    }

    /// Evaluate a chunk and render its results with `tostring`.
    ///
    /// Expressions are tried first (`1 + 1` yields `["2"]`), then statements.
    /// Errors always propagate, regardless of strict mode.
    pub fn eval(&self, name: &str, source: &str) -> LuaResult<Vec<String>> {
        let values = match self
            .lua
            .load(format!("return {source}"))
            .set_name(name)
            .eval::<LuaMultiValue>()
        {
            Err(LuaError::SyntaxError { .. }) => {
                self.lua.load(source).set_name(name).eval::<LuaMultiValue>()?
            }
            other => other?,
        };

        let tostring: LuaFunction = self.lua.globals().get("tostring")?;
        values
            .into_iter()
            .map(|v| tostring.call::<String>(v))
            .collect()
    }

    /// Run a full garbage collection cycle.
    ///
    /// Handles no longer referenced by any script are evicted from the cache.
    pub fn collect_garbage(&self) -> Result<()> {
        self.lua
            .gc_collect()
            .map_err(|e| anyhow!("Lua garbage collection failed: {e}"))
    }

    /// Whether script errors propagate.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The device registry behind `saul`.
    #[must_use]
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// The handle cache behind `saul`.
    #[must_use]
    pub fn handle_cache(&self) -> &HandleCache {
        &self.handle_cache
    }

    /// Direct access to the Lua state.
    ///
    /// Use for host-side setup (extra globals, test assertions). Script
    /// execution should go through `load_file`/`load_string` for logging
    /// and strict mode semantics.
    #[must_use]
    pub fn lua(&self) -> &Lua {
        &self.lua
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn runtime(strict: bool) -> LuaRuntime {
        let config = Config {
            strict,
            ..Config::default()
        };
        LuaRuntime::from_config(&config).expect("Should create runtime")
    }

    #[test]
    fn test_runtime_creation() {
        let rt = runtime(false);
        assert!(!rt.is_strict());
        assert_eq!(rt.registry().len(), 2);

        for global in ["saul", "socket", "sys", "log"] {
            let value: LuaValue = rt.lua().globals().get(global).expect("get global");
            assert!(matches!(value, LuaValue::Table(_)), "{global} should be registered");
        }
    }

    #[test]
    fn test_load_string_success() {
        let rt = runtime(false);
        rt.load_string("test", "answer = 6 * 7").expect("Should execute");
        let answer: i64 = rt.lua().globals().get("answer").expect("answer");
        assert_eq!(answer, 42);
    }

    #[test]
    fn test_non_strict_swallows_errors() {
        let rt = runtime(false);
        rt.load_string("boom", r#"error("boom")"#)
            .expect("non-strict mode should log and continue");
        rt.load_file(Path::new("/nonexistent/devbridge/script.lua"))
            .expect("missing file should only be logged");
    }

    #[test]
    fn test_strict_propagates_errors() {
        let rt = runtime(true);
        let err = rt
            .load_string("boom", r#"error("boom")"#)
            .expect_err("strict mode should propagate");
        assert!(err.to_string().contains("boom"), "{err}");

        let err = rt
            .load_string("contract", "saul.Servomotor:write()")
            .expect_err("contract violation should propagate");
        assert!(err.to_string().contains("contract"), "{err}");
    }

    #[test]
    fn test_load_file_and_require() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join("helpers.lua"),
            "return { double = function(x) return x * 2 end }",
        )
        .expect("write module");
        fs::write(
            dir.path().join("main.lua"),
            r#"result = require("helpers").double(21)"#,
        )
        .expect("write script");

        let config = Config {
            strict: true,
            script_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let rt = LuaRuntime::from_config(&config).expect("Should create runtime");
        rt.load_file(Path::new("main.lua")).expect("Should run script");
        let result: i64 = rt.lua().globals().get("result").expect("result");
        assert_eq!(result, 42);
    }

    #[test]
    fn test_eval_expressions_and_statements() {
        let rt = runtime(false);
        assert_eq!(rt.eval("repl", "1 + 1").expect("eval"), vec!["2"]);
        assert_eq!(
            rt.eval("repl", "saul.TSL45315").expect("eval"),
            vec!["saul_dev: TSL45315"]
        );
        assert!(rt.eval("repl", "x = 5").expect("eval").is_empty());
        assert_eq!(rt.eval("repl", "x, nil").expect("eval"), vec!["5", "nil"]);
        assert!(rt.eval("repl", "error('nope')").is_err());
    }

    #[test]
    fn test_collect_garbage_evicts_handles() {
        let rt = runtime(false);
        rt.load_string("grab", "local d = saul.TSL45315; d:get_name()")
            .expect("run");
        rt.collect_garbage().expect("gc");
        rt.collect_garbage().expect("gc");
        assert!(rt.handle_cache().is_empty());
    }
}
