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

//! This module provides deserialization primitives for RESP2 frames
//!
//! The parser is incremental: the connection appends raw socket reads to
//! its buffer and calls [`Parser::parse`] which either returns one fully
//! parsed frame plus the number of bytes it occupied, or
//! [`ParseError::NotEnough`] without consuming anything. Partial frames
//! survive across reads because consumption only happens through the
//! returned byte count.

use super::{
    Frame, ParseError, ParseResult, MAX_ARRAY_LEN, MAX_BULK_SIZE, MAX_INLINE_SIZE,
    MAX_NESTING_DEPTH,
};
use crate::corestore::Data;

/// A single-shot cursor over the connection buffer
pub struct Parser<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    /// Try to take one frame off the front of `buf`. On success the second
    /// field is the number of bytes to discard from the buffer
    pub fn parse(buf: &'a [u8]) -> ParseResult<(Frame, usize)> {
        if buf.is_empty() {
            return Err(ParseError::NotEnough);
        }
        let mut slf = Parser { buf, cursor: 0 };
        let frame = slf.parse_element(0)?;
        Ok((frame, slf.cursor))
    }
    fn parse_element(&mut self, depth: usize) -> ParseResult<Frame> {
        if depth > MAX_NESTING_DEPTH {
            return Err(ParseError::BadPacket);
        }
        let first = *self.buf.get(self.cursor).ok_or(ParseError::NotEnough)?;
        match first {
            b'+' => {
                self.cursor += 1;
                let line = self.read_line()?;
                Ok(Frame::Simple(String::from_utf8_lossy(line).into_owned()))
            }
            b'-' => {
                self.cursor += 1;
                let line = self.read_line()?;
                Ok(Frame::Error(String::from_utf8_lossy(line).into_owned()))
            }
            b':' => {
                self.cursor += 1;
                let line = self.read_line()?;
                Ok(Frame::Integer(Self::parse_int(line)?))
            }
            b'$' => self.parse_bulk(),
            b'*' => self.parse_array(depth),
            _ => self.parse_inline(),
        }
    }
    /// Read up to (but not including) the next CRLF, leaving the cursor
    /// just past it. A stray CR is a hard error
    fn read_line(&mut self) -> ParseResult<&'a [u8]> {
        let start = self.cursor;
        let mut i = start;
        loop {
            if i >= self.buf.len() {
                return Err(ParseError::NotEnough);
            }
            if self.buf[i] == b'\r' {
                return match self.buf.get(i + 1) {
                    None => Err(ParseError::NotEnough),
                    Some(b'\n') => {
                        self.cursor = i + 2;
                        Ok(&self.buf[start..i])
                    }
                    Some(_) => Err(ParseError::BadPacket),
                };
            }
            i += 1;
        }
    }
    fn parse_int(line: &[u8]) -> ParseResult<i64> {
        std::str::from_utf8(line)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(ParseError::BadPacket)
    }
    fn parse_bulk(&mut self) -> ParseResult<Frame> {
        self.cursor += 1;
        let line = self.read_line()?;
        let len = Self::parse_int(line)?;
        if len == -1 {
            return Ok(Frame::NullBulk);
        }
        if len < 0 {
            return Err(ParseError::BadPacket);
        }
        let len = len as usize;
        if len > MAX_BULK_SIZE {
            return Err(ParseError::DatatypeTooLarge);
        }
        if self.buf.len() < self.cursor + len + 2 {
            return Err(ParseError::NotEnough);
        }
        let payload = &self.buf[self.cursor..self.cursor + len];
        if &self.buf[self.cursor + len..self.cursor + len + 2] != b"\r\n" {
            return Err(ParseError::BadPacket);
        }
        self.cursor += len + 2;
        Ok(Frame::Bulk(Data::copy_from_slice(payload)))
    }
    fn parse_array(&mut self, depth: usize) -> ParseResult<Frame> {
        self.cursor += 1;
        let line = self.read_line()?;
        let count = Self::parse_int(line)?;
        if count == -1 {
            return Ok(Frame::NullArray);
        }
        if count < 0 || count > MAX_ARRAY_LEN {
            return Err(ParseError::BadPacket);
        }
        let mut items = Vec::with_capacity((count as usize).min(1024));
        for _ in 0..count {
            items.push(self.parse_element(depth + 1)?);
        }
        Ok(Frame::Array(items))
    }
    /// An inline command: a single line not opening with a type symbol,
    /// split on unquoted whitespace
    fn parse_inline(&mut self) -> ParseResult<Frame> {
        let start = self.cursor;
        let line = match self.read_line() {
            Ok(line) => line,
            Err(ParseError::NotEnough) => {
                return if self.buf.len() - start > MAX_INLINE_SIZE {
                    Err(ParseError::BadPacket)
                } else {
                    Err(ParseError::NotEnough)
                };
            }
            Err(e) => return Err(e),
        };
        let text = String::from_utf8_lossy(line);
        let args = libsable::split_into_args(&text);
        Ok(Frame::Array(
            args.into_iter()
                .map(|arg| Frame::Bulk(Data::from(arg)))
                .collect(),
        ))
    }
}
