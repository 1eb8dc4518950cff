//! Script values to UDP endpoints.
//!
//! Every socket call that takes an endpoint accepts the same shapes:
//!
//! ```lua
//! nil                                    -- no constraint
//! "[2001:db8::1]:5683"                   -- text form
//! { port = 5683 }                        -- partial table
//! { address = "::1", port = 5683, netif = 6 }
//! ```
//!
//! Malformed input is not a script error: the caller gets
//! [`EndpointParse::Error`] and turns it into `nil, message`. Only values of
//! the wrong type (numbers, booleans, functions) raise.

use std::net::Ipv6Addr;
use std::str::FromStr;

use mlua::prelude::*;

use crate::net::endpoint::{AddressFamily, Endpoint, EndpointParseError};

/// The text form could not be parsed.
pub const MSG_MALFORMED: &str = "Address/port badly formatted";

/// A numeric field holds something that is not a number.
pub const MSG_NOT_A_NUMBER: &str = "Cannot convert object to number";

/// A numeric field does not fit 16 bits.
pub const MSG_NOT_16_BIT: &str = "Number off-range (must be 16 bit)";

/// The `address` field is empty or not an IPv6 address.
pub const MSG_BAD_ADDRESS: &str = "Address badly formatted";

/// Outcome of reading an endpoint argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointParse {
    /// Argument was nil or missing.
    Absent,
    /// A (possibly partial) endpoint.
    Parsed(Endpoint),
    /// Malformed input, with the message to hand back to the script.
    Error(&'static str),
}

impl EndpointParse {
    /// Split into the optional endpoint or the error message.
    pub fn into_option(self) -> Result<Option<Endpoint>, &'static str> {
        match self {
            Self::Absent => Ok(None),
            Self::Parsed(ep) => Ok(Some(ep)),
            Self::Error(msg) => Err(msg),
        }
    }
}

enum Field<T> {
    Absent,
    Value(T),
    Invalid(&'static str),
}

/// Numeric table fields go through Lua's own coercion, so `"0x10"` and
/// `"1e3"` count as numbers while `"inf"` does not.
fn read_u16(lua: &Lua, table: &LuaTable, key: &str) -> LuaResult<Field<u16>> {
    let value: LuaValue = table.get(key)?;
    if value.is_nil() {
        return Ok(Field::Absent);
    }
    let Some(n) = lua.coerce_number(value)? else {
        return Ok(Field::Invalid(MSG_NOT_A_NUMBER));
    };
    if (0.0..=f64::from(u16::MAX)).contains(&n) {
        Ok(Field::Value(n as u16))
    } else {
        Ok(Field::Invalid(MSG_NOT_16_BIT))
    }
}

fn read_address(table: &LuaTable) -> LuaResult<Field<Ipv6Addr>> {
    let value: LuaValue = table.get("address")?;
    let parsed = match &value {
        LuaValue::Nil => return Ok(Field::Absent),
        LuaValue::String(s) => s
            .to_str()
            .ok()
            .filter(|text| !text.is_empty())
            .and_then(|text| Ipv6Addr::from_str(&text).ok()),
        _ => None,
    };
    Ok(parsed.map_or(Field::Invalid(MSG_BAD_ADDRESS), Field::Value))
}

fn parse_table(lua: &Lua, table: &LuaTable) -> LuaResult<EndpointParse> {
    let mut ep = Endpoint::any();

    match read_u16(lua, table, "port")? {
        Field::Absent => {}
        Field::Value(port) => ep.port = port,
        Field::Invalid(msg) => return Ok(EndpointParse::Error(msg)),
    }

    match read_u16(lua, table, "netif")? {
        Field::Absent => {}
        Field::Value(netif) => ep.netif = netif,
        Field::Invalid(msg) => return Ok(EndpointParse::Error(msg)),
    }

    match read_address(table)? {
        Field::Absent => {}
        Field::Value(addr) => {
            ep.family = AddressFamily::Inet6;
            ep.addr = addr.octets();
        }
        Field::Invalid(msg) => return Ok(EndpointParse::Error(msg)),
    }

    Ok(EndpointParse::Parsed(ep))
}

/// Read an endpoint argument.
///
/// # Errors
///
/// Raises a Lua error for values that are neither nil, string nor table.
pub fn parse_endpoint(lua: &Lua, value: &LuaValue) -> LuaResult<EndpointParse> {
    match value {
        LuaValue::Nil => Ok(EndpointParse::Absent),
        LuaValue::String(s) => {
            let parsed = s
                .to_str()
                .map_err(|_not_utf8| EndpointParseError)
                .and_then(|text| Endpoint::from_str(&text));
            Ok(match parsed {
                Ok(ep) => EndpointParse::Parsed(ep),
                Err(EndpointParseError) => EndpointParse::Error(MSG_MALFORMED),
            })
        }
        LuaValue::Table(table) => parse_table(lua, table),
        other => Err(LuaError::runtime(format!(
            "bad endpoint (string or table expected, got {})",
            other.type_name()
        ))),
    }
}
