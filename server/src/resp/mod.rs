/*
 * Created on Mon May 17 2021
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

//! # Reply encoding
//!
//! Command handlers return semantic [`Response`] values; this module turns
//! them into RESP2 bytes. Encoding is pure: handlers never see the socket.

use crate::corestore::Data;
use bytes::{BufMut, Bytes, BytesMut};

/// A semantic reply value. The null-bulk/empty-array distinction is
/// preserved all the way to the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// `+OK\r\n`, by far the most common reply
    Okay,
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Data),
    NullBulk,
    Array(Vec<Response>),
    NullArray,
    /// several top-level frames written back to back (the shape of
    /// subscribe/unsubscribe acknowledgements)
    Multiple(Vec<Response>),
}

impl Response {
    /// Encode into the connection's write buffer
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Response::Okay => buf.put_slice(b"+OK\r\n"),
            Response::Simple(s) => {
                buf.put_u8(b'+');
                buf.put_slice(s.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Error(e) => {
                buf.put_u8(b'-');
                buf.put_slice(e.as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Integer(int) => {
                buf.put_u8(b':');
                buf.put_slice(int.to_string().as_bytes());
                buf.put_slice(b"\r\n");
            }
            Response::Bulk(data) => {
                buf.put_u8(b'$');
                buf.put_slice(data.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                buf.put_slice(data.as_ref());
                buf.put_slice(b"\r\n");
            }
            Response::NullBulk => buf.put_slice(b"$-1\r\n"),
            Response::Array(items) => {
                buf.put_u8(b'*');
                buf.put_slice(items.len().to_string().as_bytes());
                buf.put_slice(b"\r\n");
                for item in items {
                    item.write_to(buf);
                }
            }
            Response::NullArray => buf.put_slice(b"*-1\r\n"),
            Response::Multiple(frames) => {
                for frame in frames {
                    frame.write_to(buf);
                }
            }
        }
    }
    /// Encode into a standalone buffer (pub/sub pushes)
    pub fn into_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }
    /// `$-1` for `None`
    pub fn bulk_or_null(data: Option<Data>) -> Response {
        match data {
            Some(d) => Response::Bulk(d),
            None => Response::NullBulk,
        }
    }
    /// An array of bulk strings
    pub fn str_array(items: Vec<Data>) -> Response {
        Response::Array(items.into_iter().map(Response::Bulk).collect())
    }
}

impl From<i64> for Response {
    fn from(int: i64) -> Self {
        Response::Integer(int)
    }
}

impl From<usize> for Response {
    fn from(int: usize) -> Self {
        Response::Integer(int as i64)
    }
}

impl From<bool> for Response {
    fn from(b: bool) -> Self {
        Response::Integer(b as i64)
    }
}

impl From<Data> for Response {
    fn from(data: Data) -> Self {
        Response::Bulk(data)
    }
}

impl From<Option<Data>> for Response {
    fn from(data: Option<Data>) -> Self {
        Response::bulk_or_null(data)
    }
}
