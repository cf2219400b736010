/*
 * Created on Wed May 19 2021
 *
 * This file is a part of Sable
 * Sable is a free and open-source in-memory data structure store that
 * speaks the Redis RESP2 protocol, written by Sayan Nandan ("the Author")
 * with the vision to provide a fast and reliable caching and data
 * structure layer without compromising on simplicity
 *
 * Copyright (c) 2021, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Actions
//!
//! Actions are the command handlers: you provide arguments, they return a
//! [`Response`](crate::resp::Response). Handlers are pure over the keyspace;
//! they never buffer bytes or touch the socket. This module holds the shared
//! parsing and formatting helpers plus the `ActionError` type every handler
//! returns.

#[macro_use]
mod macros;
pub mod hashes;
pub mod keys;
pub mod lists;
pub mod pubsub;
pub mod sets;
pub mod strings;
pub mod zsets;
#[cfg(test)]
mod tests;

use crate::protocol::responses;
use std::io::Error as IoError;

/// A generic result for actions
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors that can occur while running actions. The `ActionError` variant
/// carries the exact error line the client sees (sans the leading `-`)
#[derive(Debug)]
pub enum ActionError {
    ActionError(String),
    IoError(IoError),
}

impl PartialEq for ActionError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ActionError(a1), Self::ActionError(a2)) => a1 == a2,
            (Self::IoError(ioe1), Self::IoError(ioe2)) => ioe1.to_string() == ioe2.to_string(),
            _ => false,
        }
    }
}

impl From<&str> for ActionError {
    fn from(e: &str) -> Self {
        Self::ActionError(e.to_owned())
    }
}

impl From<String> for ActionError {
    fn from(e: String) -> Self {
        Self::ActionError(e)
    }
}

impl From<IoError> for ActionError {
    fn from(e: IoError) -> Self {
        Self::IoError(e)
    }
}

/// Shorthand for bailing out with a client-facing error
pub fn err<T>(e: impl Into<ActionError>) -> ActionResult<T> {
    Err(e.into())
}

/// Parse a signed 64-bit decimal the way the integer commands demand:
/// the whole blob must be a valid number
pub fn parse_i64(data: &[u8]) -> ActionResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ActionError::from(responses::ERR_NOT_INTEGER))
}

/// Parse an IEEE-754 double, accepting `inf`/`+inf`/`-inf` but never NaN.
/// The error line differs per caller (`ERR value is not a valid float`,
/// `ERR hash value is not a float`, ...)
pub fn parse_f64(data: &[u8], errmsg: &'static str) -> ActionResult<f64> {
    let parsed: Option<f64> = std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.trim().parse().ok());
    match parsed {
        Some(f) if !f.is_nan() => Ok(f),
        _ => err(errmsg),
    }
}

/// Format a double the way score and float replies are rendered: integral
/// values drop the decimal point, everything else is the shortest
/// round-trip decimal
pub fn fmt_f64(val: f64) -> String {
    if val.is_infinite() {
        if val > 0.0 {
            "inf".to_owned()
        } else {
            "-inf".to_owned()
        }
    } else if val == val.trunc() && val.abs() < 1e17 {
        format!("{}", val as i64)
    } else {
        format!("{}", val)
    }
}

/// Clamp an inclusive `[start, stop]` index pair (negative values count
/// from the end) onto `[0, len)`. `None` means the range selects nothing
pub fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let mut start = if start < 0 { start + len } else { start };
    let mut stop = if stop < 0 { stop + len } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

/// Resolve a possibly-negative index against `len` without clamping
/// (`LINDEX`/`LSET` semantics)
pub fn resolve_index(idx: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if idx < 0 { idx + len } else { idx };
    if idx < 0 || idx >= len {
        None
    } else {
        Some(idx as usize)
    }
}
