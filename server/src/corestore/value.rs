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

use crate::corestore::zset::SortedSet;
use crate::corestore::Data;
use std::collections::{HashMap, HashSet, VecDeque};

/// The type tag carried next to every value. Every command discriminates on
/// this before acting; a mismatch is the universal `WRONGTYPE` signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Str,
    List,
    Hash,
    Set,
    Zset,
}

impl Tag {
    /// The type name as reported by `TYPE`
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Str => "string",
            Tag::List => "list",
            Tag::Hash => "hash",
            Tag::Set => "set",
            Tag::Zset => "zset",
        }
    }
    /// A fresh, empty container of this type
    pub fn empty_value(self) -> Value {
        match self {
            Tag::Str => Value::Str(Data::empty()),
            Tag::List => Value::List(VecDeque::new()),
            Tag::Hash => Value::Hash(HashMap::new()),
            Tag::Set => Value::Set(HashSet::new()),
            Tag::Zset => Value::Zset(SortedSet::new()),
        }
    }
}

/// A value in the keyspace: a tagged union over the five supported types
#[derive(Debug, Clone)]
pub enum Value {
    Str(Data),
    List(VecDeque<Data>),
    Hash(HashMap<Data, Data>),
    Set(HashSet<Data>),
    Zset(SortedSet),
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::Str(_) => Tag::Str,
            Value::List(_) => Tag::List,
            Value::Hash(_) => Tag::Hash,
            Value::Set(_) => Tag::Set,
            Value::Zset(_) => Tag::Zset,
        }
    }
    /// True for containers that have become empty and should be dropped from
    /// the keyspace. Strings never count as empty containers
    pub fn is_drained_container(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Zset(z) => z.is_empty(),
        }
    }
    pub fn as_str(&self) -> Option<&Data> {
        match self {
            Value::Str(d) => Some(d),
            _ => None,
        }
    }
    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Data>> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
    pub fn as_set_mut(&mut self) -> Option<&mut HashSet<Data>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }
}
