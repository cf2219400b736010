/*
 * Created on Mon May 10 2021
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

//! # The RESP2 wire protocol
//!
//! The parser side lives in [`deserializer`]; the reply encoder lives in
//! the `resp` module. This module defines the frame model shared by both
//! and the protocol limits.

mod deserializer;
pub mod responses;
#[cfg(test)]
mod tests;

pub use deserializer::Parser;

use crate::corestore::Data;

/// Largest accepted bulk string payload (anything bigger is a protocol
/// error, as recommended for RESP2)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;
/// Largest accepted multibulk element count
pub const MAX_ARRAY_LEN: i64 = 1024 * 1024;
/// Maximum array nesting the parser will follow
pub const MAX_NESTING_DEPTH: usize = 32;
/// An inline command line longer than this without a CRLF is malformed
pub const MAX_INLINE_SIZE: usize = 64 * 1024;

/// One complete RESP2 frame. Inline commands surface as `Array`s of bulk
/// strings, exactly like their multibulk equivalents
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Data),
    NullBulk,
    Array(Vec<Frame>),
    NullArray,
}

impl Frame {
    /// Flatten a client frame into the argument list of a command. Only
    /// arrays of bulk (or simple) strings qualify
    pub fn into_command(self) -> Result<Vec<Data>, &'static str> {
        match self {
            Frame::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Frame::Bulk(d) => out.push(d),
                        Frame::Simple(s) => out.push(Data::from(s)),
                        _ => return Err("ERR Protocol error: expected bulk string"),
                    }
                }
                Ok(out)
            }
            // a null array from a client is as good as an empty command
            Frame::NullArray => Ok(Vec::new()),
            _ => Err("ERR Protocol error: expected array"),
        }
    }
}

/// Outcome of attempting to parse one frame out of the buffer
#[derive(Debug, PartialEq)]
pub enum ParseError {
    /// more data needs to be read; nothing was consumed
    NotEnough,
    /// the stream is misaligned or contains an invalid byte. Recovery is
    /// unsafe: the connection must be closed
    BadPacket,
    /// a bulk string exceeded [`MAX_BULK_SIZE`]
    DatatypeTooLarge,
}

impl ParseError {
    /// The error line sent to the client before the connection is closed
    pub fn message(&self) -> &'static str {
        match self {
            ParseError::DatatypeTooLarge => "ERR Protocol error: invalid bulk length",
            _ => "ERR Protocol error",
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
