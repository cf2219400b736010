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

use crate::config::SavePoint;
use crate::corestore::Corestore;
use crate::dbnet::Terminator;
use crate::diskstore;
use crate::util;
use crate::util::error::SableResult;
use tokio::time::{self, Duration};

/// The bgsave_scheduler wakes up once per wall second and triggers a save
/// as soon as any configured `(seconds, changes)` pair is satisfied.
/// With no save-points configured the service exits immediately
pub async fn bgsave_scheduler(
    handle: Corestore,
    save_points: Vec<SavePoint>,
    mut terminator: Terminator,
) {
    if save_points.is_empty() {
        // the user doesn't bother about their data; cool, let's not
        // bother about it either
        log::info!("BGSAVE service is disabled");
        return;
    }
    while !terminator.is_termination_signal() {
        tokio::select! {
            // Sleep until a second from the current time instant
            _ = time::sleep_until(time::Instant::now() + Duration::from_secs(1)) => {
                if should_save(&handle, &save_points) {
                    let cloned_handle = handle.clone();
                    // we spawn this on a blocking worker to ensure that it
                    // doesn't hold up the runtime's async workers
                    tokio::task::spawn_blocking(move || {
                        let owned_handle = cloned_handle;
                        let _ = bgsave_blocking_section(owned_handle);
                    }).await.expect("Something caused the background service to panic");
                }
            }
            // Otherwise wait for a notification to quit
            _ = terminator.receive_signal() => {}
        }
    }
    log::info!("BGSAVE service has exited");
}

/// Is any save-point satisfied right now?
fn should_save(handle: &Corestore, save_points: &[SavePoint]) -> bool {
    let dirty = handle.dirty_count();
    if dirty == 0 {
        return false;
    }
    let elapsed_secs = util::time_now_ms().saturating_sub(handle.last_save_ms()) / 1000;
    save_points
        .iter()
        .any(|sp| elapsed_secs >= sp.seconds && dirty >= sp.changes)
}

/// Serialize a snapshot under the read lock, write it to the temporary
/// file and rename it over the previous one. On success the dirty counter
/// drops by the amount the snapshot captured and the save time is
/// stamped; on failure both are left untouched
pub fn run_bgsave(handle: &Corestore) -> SableResult<()> {
    let captured_dirty = handle.dirty_count();
    let snapshot = handle.make_snapshot();
    diskstore::flush_data(handle.rdb_path(), handle.rdb_tmp_path(), &snapshot)?;
    handle.after_save(captured_dirty, snapshot.saved_on);
    Ok(())
}

/// This just wraps around [`run_bgsave`] and prints nice log messages
/// depending on the outcome
fn bgsave_blocking_section(handle: Corestore) -> bool {
    match run_bgsave(&handle) {
        Ok(()) => {
            log::info!("BGSAVE completed successfully");
            true
        }
        Err(e) => {
            log::error!("BGSAVE failed with error: {}", e);
            false
        }
    }
}
