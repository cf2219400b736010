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

use crate::corestore::Corestore;
use crate::dbnet::Terminator;
use crate::util;
use tokio::time::{self, Duration};

/// At most this many expired entries are reclaimed per sweep, keeping the
/// write-lock hold time bounded
const SWEEP_LIMIT: usize = 512;

/// The active expiration service: once per second, reclaim a bounded
/// batch of keys whose TTL has lapsed so long-idle keys don't linger
/// until someone touches them
pub async fn expiry_service(handle: Corestore, mut terminator: Terminator) {
    while !terminator.is_termination_signal() {
        tokio::select! {
            _ = time::sleep_until(time::Instant::now() + Duration::from_secs(1)) => {
                let now = util::time_now_ms();
                let removed = handle.keyspace_mut().sweep_expired(now, SWEEP_LIMIT);
                if removed != 0 {
                    log::debug!("Expiry sweep reclaimed {} keys", removed);
                    handle.mark_dirty(removed);
                }
            }
            _ = terminator.receive_signal() => {}
        }
    }
    log::info!("Expiry service has exited");
}
