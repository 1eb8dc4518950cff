//! UDP socket primitives for Lua scripts.
//!
//! # Usage in Lua
//!
//! ```lua
//! local sock, err = socket.udp({ port = 5683 })
//! if not sock then error(err) end
//!
//! sock:send("hello", "[::1]:5683")         -- bytes sent, or nil, message
//! local data, err = sock:recv(64, 1000)    -- payload, or nil, message
//! sock:close()
//! ```
//!
//! Endpoints are nil, a string like `"[::1]:5683"`, or a table with
//! `address`, `port` and `netif` fields. Operational failures come back as
//! `nil, message`; only calls with wrong argument types raise.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use mlua::prelude::*;

use super::endpoint::parse_endpoint;
use super::nil_and_message;
use crate::net::{
    DatagramSocket, DatagramStack, Endpoint, RecvTimeout, SockError, MAX_DATAGRAM_LEN, REUSE_EP,
};

/// Lua handle for an open (or closed) UDP socket.
#[derive(Debug)]
pub struct LuaUdpSocket {
    sock: Option<Box<dyn DatagramSocket>>,
}

impl LuaUdpSocket {
    fn new(sock: Box<dyn DatagramSocket>) -> Self {
        Self { sock: Some(sock) }
    }

    fn open(&mut self) -> Result<&mut Box<dyn DatagramSocket>, SockError> {
        self.sock.as_mut().ok_or(SockError::Closed)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.sock.is_none()
    }
}

/// Read an endpoint argument, or the `nil, message` pair to return instead.
macro_rules! endpoint_arg {
    ($lua:expr, $value:expr) => {
        match parse_endpoint($lua, &$value)?.into_option() {
            Ok(ep) => ep,
            Err(msg) => return nil_and_message($lua, msg),
        }
    };
}

impl LuaUserData for LuaUdpSocket {
    fn add_methods<M: LuaUserDataMethods<Self>>(methods: &mut M) {
        // sock:send(data, remote?) -> sent | nil, msg
        methods.add_method_mut("send", |lua, this, (data, remote): (LuaString, LuaValue)| {
            let remote: Option<Endpoint> = endpoint_arg!(lua, remote);
            let result = this
                .open()
                .and_then(|sock| sock.send(&data.as_bytes(), remote.as_ref()));
            match result {
                Ok(sent) => sent.into_lua_multi(lua),
                Err(e) => {
                    log::debug!("UDP send failed: {e}");
                    nil_and_message(lua, e)
                }
            }
        });

        // sock:recv(max_len, timeout_ms, filter?) -> bytes | nil, msg
        methods.add_method_mut(
            "recv",
            |lua, this, (max_len, timeout_ms, filter): (i64, i64, LuaValue)| {
                let max_len = usize::try_from(max_len)
                    .map_err(|_negative| {
                        LuaError::runtime(format!("recv: max_len must be >= 0, got {max_len}"))
                    })?
                    .min(MAX_DATAGRAM_LEN);
                let filter: Option<Endpoint> = endpoint_arg!(lua, filter);
                let timeout = RecvTimeout::from_millis(timeout_ms);
                let result = this
                    .open()
                    .and_then(|sock| sock.recv(max_len, timeout, filter.as_ref()));
                match result {
                    Ok(bytes) => lua.create_string(&bytes)?.into_lua_multi(lua),
                    Err(e) => nil_and_message(lua, e),
                }
            },
        );

        // sock:close()
        methods.add_method_mut("close", |_, this, ()| {
            if let Some(sock) = this.sock.take() {
                log::debug!("Closing UDP socket {sock:?}");
            }
            Ok(())
        });

        // sock:get_local() -> "[addr]:port" | nil, msg
        methods.add_method_mut("get_local", |lua, this, ()| {
            match this.open().and_then(|sock| sock.local_endpoint()) {
                Ok(ep) => ep.to_string().into_lua_multi(lua),
                Err(e) => nil_and_message(lua, e),
            }
        });

        methods.add_meta_method(LuaMetaMethod::ToString, |_, this, ()| {
            Ok(match &this.sock {
                Some(sock) => match sock.local_endpoint() {
                    Ok(ep) => format!("udp_sock: {ep}"),
                    Err(_) => "udp_sock: unbound".to_string(),
                },
                None => "udp_sock: closed".to_string(),
            })
        });
    }
}

/// Register the `socket` table.
///
/// Creates a global `socket` table with:
/// - `socket.udp(local?, remote?, flags...)` - Open a UDP socket
/// - `socket.REUSE_EP` - Flag allowing several sockets on one local endpoint
///
/// # Errors
///
/// Returns an error if Lua table or function creation fails.
pub fn register(lua: &Lua, stack: Arc<dyn DatagramStack>) -> Result<()> {
    let socket_table = lua
        .create_table()
        .map_err(|e| anyhow!("Failed to create socket table: {e}"))?;

    // socket.udp(local?, remote?, flags...)
    let udp_fn = lua
        .create_function(
            move |lua, (local, remote, flags): (LuaValue, LuaValue, LuaVariadic<i64>)| {
                let local: Option<Endpoint> = endpoint_arg!(lua, local);
                let remote: Option<Endpoint> = endpoint_arg!(lua, remote);
                let flags = flags.iter().try_fold(0u16, |acc, &f| {
                    u16::try_from(f).map(|f| acc | f).map_err(|_out_of_range| {
                        LuaError::runtime(format!("socket.udp: flag out of range: {f}"))
                    })
                })?;

                match stack.create(local.as_ref(), remote.as_ref(), flags) {
                    Ok(sock) => {
                        log::debug!("Opened UDP socket {sock:?} (flags {flags:#06x})");
                        LuaUdpSocket::new(sock).into_lua_multi(lua)
                    }
                    Err(e) => {
                        log::debug!("UDP socket creation failed: {e}");
                        nil_and_message(lua, e.create_message())
                    }
                }
            },
        )
        .map_err(|e| anyhow!("Failed to create socket.udp function: {e}"))?;
    socket_table
        .set("udp", udp_fn)
        .map_err(|e| anyhow!("Failed to set socket.udp: {e}"))?;

    socket_table
        .set("REUSE_EP", REUSE_EP)
        .map_err(|e| anyhow!("Failed to set socket.REUSE_EP: {e}"))?;

    lua.globals()
        .set("socket", socket_table)
        .map_err(|e| anyhow!("Failed to register socket table globally: {e}"))?;

    Ok(())
}
