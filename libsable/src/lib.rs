/*
 * Created on Mon Mar 15 2021
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

//! The core library for Sable
//!
//! This contains modules which are shared by both the `cli` and the `server` modules

pub mod util;
use std::error::Error;
/// A generic result
pub type TResult<T> = Result<T, Box<dyn Error>>;
/// The current version of the project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// The project website
pub const URL: &str = "https://github.com/sable-kv/sable";
/// The size of the per-connection read buffer in bytes
pub const BUF_CAP: usize = 4 * 1024; // 4 KB per-connection

use std::str::FromStr;

lazy_static::lazy_static! {
    static ref RE: regex::Regex = regex::Regex::from_str(r#"("[^"]*"|'[^']*'|[\S]+)+"#).unwrap();
}

/// Split a line of text into arguments, keeping single and double quoted
/// sequences together. Quotes themselves are not part of the arguments
pub fn split_into_args(q: &str) -> Vec<String> {
    let args: Vec<String> = RE
        .find_iter(q)
        .map(|val| val.as_str().replace("'", "").replace("\"", ""))
        .collect();
    args
}

#[test]
fn test_split_into_args() {
    assert_eq!(
        split_into_args("set 'my key' \"my value\""),
        vec!["set".to_owned(), "my key".to_owned(), "my value".to_owned()]
    );
    assert_eq!(
        split_into_args("lpush mylist a b c"),
        vec!["lpush", "mylist", "a", "b", "c"]
    );
}
