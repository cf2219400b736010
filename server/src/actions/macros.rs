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

#[macro_export]
/// Declare command handlers with the canonical signature
/// `fn(&Corestore, &mut ClientContext, &[Data]) -> ActionResult<Response>`
macro_rules! action {
    (
        $($(#[$attr:meta])*
        fn $name:ident($handle:ident: $htype:ty, $con:ident: $ctype:ty, $act:ident: $atype:ty) $block:block)*
    ) => {
        $(
            $(#[$attr])*
            pub fn $name(
                $handle: $htype,
                $con: $ctype,
                $act: $atype,
            ) -> $crate::actions::ActionResult<$crate::resp::Response> $block
        )*
    };
}

#[macro_export]
/// Fetch a live value of the expected type out of a keyspace guard,
/// evaluating to `Option<&Value-contents>`; a live key of any other type
/// returns a `WRONGTYPE` error from the surrounding function
macro_rules! get_typed {
    ($guard:expr, $key:expr, $now:expr, $variant:ident) => {
        match $guard.get($key.as_ref(), $now) {
            Some($crate::corestore::Value::$variant(inner)) => Some(inner),
            Some(_) => {
                return $crate::actions::err($crate::protocol::responses::WRONGTYPE_ERR)
            }
            None => None,
        }
    };
}

#[macro_export]
/// Same as [`get_typed`] but through a write guard, evicting an expired
/// entry on the way
macro_rules! get_typed_mut {
    ($guard:expr, $key:expr, $now:expr, $variant:ident) => {
        match $guard.get_mut($key.as_ref(), $now) {
            Some($crate::corestore::Value::$variant(inner)) => Some(inner),
            Some(_) => {
                return $crate::actions::err($crate::protocol::responses::WRONGTYPE_ERR)
            }
            None => None,
        }
    };
}
