//! Lua scripting layer.
//!
//! - [`runtime`] - interpreter ownership, script loading, strict mode
//! - [`primitives`] - the `saul`, `socket`, `sys` and `log` globals
//! - [`handle_cache`] - weak identity cache for device handles
//! - [`repl`] - interactive shell

pub mod handle_cache;
pub mod primitives;
pub mod repl;
pub mod runtime;

pub use handle_cache::HandleCache;
pub use runtime::LuaRuntime;
