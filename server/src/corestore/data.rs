/*
 * Created on Tue Apr 06 2021
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

use bytes::Bytes;
use core::borrow::Borrow;
use core::fmt;
use core::ops::Deref;

/// A thin wrapper over a ref-counted byte blob. Keys, values, hash fields,
/// set members and channel names are all `Data`; cloning one is a pointer
/// bump, not a copy
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Data {
    blob: Bytes,
}

impl Data {
    /// Create an empty blob
    pub fn empty() -> Self {
        Data { blob: Bytes::new() }
    }
    /// Create a new blob, copying the provided slice
    pub fn copy_from_slice(slice: &[u8]) -> Self {
        Data {
            blob: Bytes::copy_from_slice(slice),
        }
    }
    pub fn len(&self) -> usize {
        self.blob.len()
    }
    pub fn is_empty(&self) -> bool {
        self.blob.is_empty()
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.blob
    }
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.blob
    }
}

impl Borrow<[u8]> for Data {
    fn borrow(&self) -> &[u8] {
        &self.blob
    }
}

impl From<&[u8]> for Data {
    fn from(slice: &[u8]) -> Self {
        Data::copy_from_slice(slice)
    }
}

impl From<&str> for Data {
    fn from(st: &str) -> Self {
        Data::copy_from_slice(st.as_bytes())
    }
}

impl From<String> for Data {
    fn from(st: String) -> Self {
        Data {
            blob: Bytes::from(st.into_bytes()),
        }
    }
}

impl From<Vec<u8>> for Data {
    fn from(vec: Vec<u8>) -> Self {
        Data {
            blob: Bytes::from(vec),
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.blob))
    }
}
