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

//! Server state and introspection commands. `OBJECT ENCODING`, `MEMORY
//! USAGE` and `DEBUG SLEEP` return placeholder values on purpose; nothing
//! downstream consumes them.

use crate::action;
use crate::actions::{err, parse_f64, parse_i64};
use crate::corestore::{glob_matches, Corestore, Data};
use crate::dbnet::connection::{ClientContext, ShutdownMode};
use crate::protocol::responses;
use crate::queryengine;
use crate::resp::Response;
use crate::util;

action! {
    /// `PING [message]`
    fn ping(_handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        Ok(match act.first() {
            Some(msg) => Response::Bulk(msg.clone()),
            None => Response::Simple("PONG".to_owned()),
        })
    }

    /// `ECHO message`
    fn echo(_handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        Ok(Response::Bulk(act[0].clone()))
    }

    /// `QUIT`: reply OK, then the connection loop closes after the flush
    fn quit(_handle: &Corestore, con: &mut ClientContext, _act: &[Data]) {
        con.quit = true;
        Ok(Response::Okay)
    }

    /// `SELECT index`: a single logical database is exposed, so any index
    /// within the configured range lands on the same keyspace
    fn select(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let idx = parse_i64(act[0].as_ref())?;
        if idx < 0 || idx as usize >= handle.config().databases {
            return err(responses::ERR_DB_INDEX);
        }
        Ok(Response::Okay)
    }

    /// `DBSIZE`
    fn dbsize(handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        let now = util::time_now_ms();
        let len = handle.keyspace().len(now);
        Ok(Response::Integer(len as i64))
    }

    /// `FLUSHDB [ASYNC|SYNC]`
    fn flushdb(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if let Some(opt) = act.first() {
            match opt.to_ascii_uppercase().as_slice() {
                b"ASYNC" | b"SYNC" => {}
                _ => return err(responses::ERR_SYNTAX),
            }
        }
        let removed = handle.keyspace_mut().clear();
        handle.mark_dirty(removed.max(1));
        Ok(Response::Okay)
    }

    /// `FLUSHALL [ASYNC|SYNC]`: one logical database, so same as FLUSHDB
    fn flushall(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        flushdb(handle, con, act)
    }

    /// `INFO [section ...]` (section filters are accepted and ignored)
    fn info(handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        let now = util::time_now_ms();
        let uptime = (now.saturating_sub(handle.boot_time_ms())) / 1000;
        let (keys, expires) = {
            let ks = handle.keyspace();
            (ks.len(now), ks.expiring_len(now))
        };
        let mut info = format!(
            "# Server\r\n\
             sable_version:{}\r\n\
             os:{} {}\r\n\
             arch_bits:64\r\n\
             process_id:{}\r\n\
             uptime_in_seconds:{}\r\n\
             uptime_in_days:{}\r\n\
             \r\n\
             # Clients\r\n\
             connected_clients:{}\r\n\
             blocked_clients:0\r\n\
             \r\n\
             # Memory\r\n\
             used_memory:0\r\n\
             used_memory_human:0B\r\n\
             maxmemory:{}\r\n\
             \r\n\
             # Persistence\r\n\
             rdb_changes_since_last_save:{}\r\n\
             rdb_last_save_time:{}\r\n\
             \r\n\
             # Stats\r\n\
             total_commands_processed:{}\r\n\
             keyspace_hits:0\r\n\
             keyspace_misses:0\r\n\
             \r\n\
             # Replication\r\n\
             role:master\r\n\
             connected_slaves:0\r\n\
             \r\n\
             # Keyspace\r\n",
            libsable::VERSION,
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::process::id(),
            uptime,
            uptime / 86400,
            handle.connected_clients(),
            handle.config().maxmemory,
            handle.dirty_count(),
            handle.last_save_ms() / 1000,
            handle.commands_processed(),
        );
        if keys > 0 {
            info.push_str(&format!("db0:keys={},expires={}\r\n", keys, expires));
        }
        Ok(Response::Bulk(Data::from(info)))
    }

    /// `TIME`: `[unix-seconds, microseconds]`
    fn time(_handle: &Corestore, _con: &mut ClientContext, _act: &[Data]) {
        let now_ms = util::time_now_ms();
        let secs = now_ms / 1000;
        let micros = (now_ms % 1000) * 1000;
        Ok(Response::Array(vec![
            Response::Bulk(Data::from(secs.to_string())),
            Response::Bulk(Data::from(micros.to_string())),
        ]))
    }

    /// `CONFIG GET pattern | SET key value | RESETSTAT | REWRITE`. `SET`
    /// is accepted for compatibility but configuration is boot-time only
    fn config(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        match act[0].to_ascii_uppercase().as_slice() {
            b"GET" => {
                let pattern = match act.get(1) {
                    Some(pattern) => pattern,
                    None => return Ok(Response::Array(Vec::new())),
                };
                let cfg = handle.config();
                let mut flat = Vec::new();
                for (key, value) in cfg.parameters() {
                    if glob_matches(pattern.as_ref(), key.as_bytes()) {
                        flat.push(Response::Bulk(Data::from(key)));
                        flat.push(Response::Bulk(Data::from(value)));
                    }
                }
                Ok(Response::Array(flat))
            }
            b"SET" if act.len() >= 3 => Ok(Response::Okay),
            b"RESETSTAT" | b"REWRITE" => Ok(Response::Okay),
            other => err(format!(
                "ERR Unknown CONFIG subcommand or wrong number of arguments for '{}'",
                String::from_utf8_lossy(other)
            )),
        }
    }

    /// `COMMAND [COUNT|LIST|DOCS|INFO]`
    fn command(_handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let names = || {
            Response::Array(
                queryengine::command_names()
                    .into_iter()
                    .map(|name| Response::Bulk(Data::from(name.to_lowercase())))
                    .collect(),
            )
        };
        match act.first() {
            None => Ok(names()),
            Some(sub) => match sub.to_ascii_uppercase().as_slice() {
                b"COUNT" => Ok(Response::Integer(queryengine::command_count() as i64)),
                b"LIST" => Ok(names()),
                b"DOCS" | b"INFO" => {
                    // a flat [name, summary, ...] for the commands we know
                    let mut rows = Vec::new();
                    for name in &act[1..] {
                        let upper = String::from_utf8_lossy(name.as_ref()).to_uppercase();
                        if let Some(desc) = queryengine::describe(&upper) {
                            rows.push(Response::Bulk(name.clone()));
                            rows.push(Response::Bulk(Data::from(desc)));
                        }
                    }
                    Ok(Response::Array(rows))
                }
                _ => Ok(Response::Array(Vec::new())),
            },
        }
    }

    /// `CLIENT ID|GETNAME|SETNAME|LIST|...`
    fn client(_handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        match act[0].to_ascii_uppercase().as_slice() {
            b"ID" => Ok(Response::Integer(con.id as i64)),
            b"GETNAME" => Ok(Response::NullBulk),
            b"SETNAME" => Ok(Response::Okay),
            b"LIST" => Ok(Response::Bulk(Data::from(format!(
                "id={} addr=127.0.0.1:0 fd=1 name= age=0 idle=0",
                con.id
            )))),
            _ => Ok(Response::Okay),
        }
    }

    /// `DEBUG SLEEP n` and friends. `SLEEP` validates its argument and
    /// returns immediately (placeholder)
    fn debug(_handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        if act[0].to_ascii_uppercase().as_slice() == b"SLEEP" {
            if let Some(raw) = act.get(1) {
                parse_f64(raw.as_ref(), responses::ERR_NOT_FLOAT)?;
            }
        }
        Ok(Response::Okay)
    }

    /// `MEMORY USAGE key | DOCTOR`: placeholder values
    fn memory(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        match act[0].to_ascii_uppercase().as_slice() {
            b"USAGE" => {
                let key = match act.get(1) {
                    Some(key) => key,
                    None => return err("ERR wrong number of arguments for 'memory|usage' command"),
                };
                let now = util::time_now_ms();
                if handle.keyspace().contains(key.as_ref(), now) {
                    Ok(Response::Integer(64))
                } else {
                    Ok(Response::NullBulk)
                }
            }
            b"DOCTOR" => Ok(Response::Bulk(Data::from("Sam, I have no memory problems"))),
            _ => Ok(Response::NullBulk),
        }
    }

    /// `OBJECT ENCODING|REFCOUNT|IDLETIME|FREQ key`: placeholder values
    fn object(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let sub = act[0].to_ascii_uppercase();
        let key = match act.get(1) {
            Some(key) => key,
            None => return err(responses::ERR_SYNTAX),
        };
        let now = util::time_now_ms();
        let type_name = handle.keyspace().type_name(key.as_ref(), now);
        match sub.as_slice() {
            b"ENCODING" => Ok(match type_name {
                Some("string") => Response::Bulk(Data::from("embstr")),
                Some(_) => Response::Bulk(Data::from("listpack")),
                None => Response::NullBulk,
            }),
            b"REFCOUNT" => Ok(Response::Integer(1)),
            b"IDLETIME" | b"FREQ" => Ok(Response::Integer(0)),
            other => err(format!(
                "ERR Unknown OBJECT subcommand or wrong number of arguments for '{}'",
                String::from_utf8_lossy(other)
            )),
        }
    }

    /// `SHUTDOWN [NOSAVE|SAVE]`: reply OK, then the connection loop
    /// triggers the server-wide shutdown broadcast
    fn shutdown(_handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let mode = match act.first() {
            Some(opt) => match opt.to_ascii_uppercase().as_slice() {
                b"NOSAVE" => ShutdownMode::NoSave,
                b"SAVE" => ShutdownMode::Save,
                _ => return err(responses::ERR_SYNTAX),
            },
            None => ShutdownMode::Save,
        };
        con.shutdown = Some(mode);
        Ok(Response::Okay)
    }
}
