/*
 * Created on Sat May 15 2021
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

//! Error lines shared across the command handlers. Everything here goes
//! out as a RESP simple error (`-<text>\r\n`)

pub const WRONGTYPE_ERR: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";
pub const ERR_NOT_INTEGER: &str = "ERR value is not an integer or out of range";
pub const ERR_NOT_FLOAT: &str = "ERR value is not a valid float";
pub const ERR_OVERFLOW: &str = "ERR increment or decrement would overflow";
pub const ERR_FLOAT_NAN_OR_INF: &str = "ERR increment would produce NaN or Infinity";
pub const ERR_SYNTAX: &str = "ERR syntax error";
pub const ERR_NO_SUCH_KEY: &str = "ERR no such key";
pub const ERR_INDEX_OUT_OF_RANGE: &str = "ERR index out of range";
pub const ERR_OFFSET_OUT_OF_RANGE: &str = "ERR offset is out of range";
pub const ERR_VALUE_MUST_BE_POSITIVE: &str = "ERR value is out of range, must be positive";
pub const ERR_TIMEOUT_NOT_FLOAT: &str = "ERR timeout is not a float or out of range";
pub const ERR_DB_INDEX: &str = "ERR DB index is out of range";
pub const ERR_HASH_NOT_INTEGER: &str = "ERR hash value is not an integer";
pub const ERR_HASH_NOT_FLOAT: &str = "ERR hash value is not a float";
pub const ERR_MIN_MAX_NOT_FLOAT: &str = "ERR min or max is not a float";
pub const ERR_MIN_MAX_NOT_LEX: &str = "ERR min or max not valid string range item";
pub const ERR_NAN_SCORE: &str = "ERR resulting score is not a number (NaN)";
pub const ERR_ZADD_NX_XX: &str = "ERR XX and NX options at the same time are not compatible";
pub const ERR_ZADD_GT_LT_NX: &str =
    "ERR GT, LT, and/or NX options at the same time are not compatible";
pub const ERR_ZADD_INCR_PAIRS: &str =
    "ERR INCR option supports a single increment-element pair";
pub const ERR_LIMIT_NEEDS_BY: &str =
    "ERR syntax error, LIMIT is only supported in combination with either BYSCORE or BYLEX";
pub const ERR_WITHSCORES_WITH_BYLEX: &str =
    "ERR syntax error, WITHSCORES not supported in combination with BYLEX";
pub const ERR_RANK_ZERO: &str = "ERR RANK can't be zero";
pub const ERR_NEGATIVE_NUMKEYS: &str = "ERR numkeys should be greater than 0";
pub const ERR_LIMIT_NEGATIVE: &str = "ERR LIMIT can't be negative";
