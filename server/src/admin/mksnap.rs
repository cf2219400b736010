/*
 * Created on Wed Jul 14 2021
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

//! Snapshot commands: `SAVE`, `BGSAVE` and `LASTSAVE`

use crate::action;
use crate::actions::err;
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;
use crate::services;

action! {
    /// `SAVE`: snapshot in the foreground. A failure reaches the client;
    /// the dirty counter is left untouched in that case
    fn save(handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        match services::bgsave::run_bgsave(handle) {
            Ok(()) => Ok(Response::Okay),
            Err(e) => {
                log::error!("SAVE failed with error: {}", e);
                err(format!("ERR {}", e))
            }
        }
    }

    /// `BGSAVE [SCHEDULE]`: spawn the snapshot on a blocking worker
    fn bgsave(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if let Some(opt) = act.first() {
            if opt.to_ascii_uppercase().as_slice() != b"SCHEDULE" {
                return err(responses::ERR_SYNTAX);
            }
        }
        let cloned_handle = handle.clone();
        tokio::task::spawn_blocking(move || match services::bgsave::run_bgsave(&cloned_handle) {
            Ok(()) => log::info!("BGSAVE completed successfully"),
            Err(e) => log::error!("BGSAVE failed with error: {}", e),
        });
        Ok(Response::Simple("Background saving started".to_owned()))
    }

    /// `LASTSAVE`: unix time of the last successful save
    fn lastsave(handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        Ok(Response::Integer((handle.last_save_ms() / 1000) as i64))
    }
}
