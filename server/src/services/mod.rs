/*
 * Created on Sat Jul 17 2021
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

//! Background services: the save-point scheduler and the expiry sweep

pub mod bgsave;
pub mod expiry;

use crate::corestore::Keyspace;
use crate::diskstore;
use crate::util;
use std::path::Path;

/// Load the snapshot (if any) into the boot keyspace. A missing file is
/// normal; a corrupt or mismatched one is logged and the server proceeds
/// with an empty keyspace
pub fn restore_data(path: &Path) -> Keyspace {
    match diskstore::get_saved(path) {
        Ok(Some(snapshot)) => {
            let now = util::time_now_ms();
            let count = snapshot.entries.len();
            let keyspace = diskstore::keyspace_from_snapshot(snapshot, now);
            log::info!("Loaded {} keys from {}", count, path.display());
            keyspace
        }
        Ok(None) => {
            log::info!("No snapshot found, starting with an empty keyspace");
            Keyspace::new()
        }
        Err(e) => {
            log::error!(
                "Failed to load the snapshot: {}. Starting with an empty keyspace",
                e
            );
            Keyspace::new()
        }
    }
}
