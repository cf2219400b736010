/*
 * Created on Fri Jul 09 2021
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

//! The pub/sub command surface. Subscription acknowledgements are one
//! `[kind, name, remaining]` frame per argument, hence the
//! `Response::Multiple` replies.

use crate::actions::err;
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::ClientContext;
use crate::protocol::responses;
use crate::resp::Response;

fn ack(kind: &str, name: Option<Data>, remaining: usize) -> Response {
    Response::Array(vec![
        Response::Bulk(Data::from(kind)),
        match name {
            Some(name) => Response::Bulk(name),
            None => Response::NullBulk,
        },
        Response::Integer(remaining as i64),
    ])
}

action! {
    /// `SUBSCRIBE channel [channel ...]`
    fn subscribe(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let mut frames = Vec::with_capacity(act.len());
        for channel in act {
            if !con.subscriptions.contains(channel.as_ref()) {
                handle
                    .pubsub()
                    .subscribe(con.id, channel.clone(), con.msg_tx.clone());
                con.subscriptions.insert(channel.clone());
            }
            frames.push(ack(
                "subscribe",
                Some(channel.clone()),
                con.subscription_count(),
            ));
        }
        Ok(Response::Multiple(frames))
    }

    /// `UNSUBSCRIBE [channel ...]`: no arguments means all
    fn unsubscribe(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let targets: Vec<Data> = if act.is_empty() {
            con.subscriptions.iter().cloned().collect()
        } else {
            act.to_vec()
        };
        if targets.is_empty() {
            return Ok(ack("unsubscribe", None, con.subscription_count()));
        }
        let mut frames = Vec::with_capacity(targets.len());
        for channel in targets {
            handle.pubsub().unsubscribe(con.id, channel.as_ref());
            con.subscriptions.remove(channel.as_ref());
            frames.push(ack(
                "unsubscribe",
                Some(channel),
                con.subscription_count(),
            ));
        }
        Ok(Response::Multiple(frames))
    }

    /// `PSUBSCRIBE pattern [pattern ...]`
    fn psubscribe(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let mut frames = Vec::with_capacity(act.len());
        for pattern in act {
            if !con.psubscriptions.contains(pattern.as_ref()) {
                handle
                    .pubsub()
                    .psubscribe(con.id, pattern.clone(), con.msg_tx.clone());
                con.psubscriptions.insert(pattern.clone());
            }
            frames.push(ack(
                "psubscribe",
                Some(pattern.clone()),
                con.subscription_count(),
            ));
        }
        Ok(Response::Multiple(frames))
    }

    /// `PUNSUBSCRIBE [pattern ...]`
    fn punsubscribe(handle: &Corestore, con: &mut ClientContext, act: &[Data]) {
        let targets: Vec<Data> = if act.is_empty() {
            con.psubscriptions.iter().cloned().collect()
        } else {
            act.to_vec()
        };
        if targets.is_empty() {
            return Ok(ack("punsubscribe", None, con.subscription_count()));
        }
        let mut frames = Vec::with_capacity(targets.len());
        for pattern in targets {
            handle.pubsub().punsubscribe(con.id, pattern.as_ref());
            con.psubscriptions.remove(pattern.as_ref());
            frames.push(ack(
                "punsubscribe",
                Some(pattern),
                con.subscription_count(),
            ));
        }
        Ok(Response::Multiple(frames))
    }

    /// `PUBLISH channel message`: replies with the delivery count
    fn publish(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        let delivered = handle.pubsub().publish(&act[0], &act[1]);
        Ok(Response::Integer(delivered as i64))
    }

    /// `PUBSUB CHANNELS [pattern] | NUMSUB [channel ...] | NUMPAT`
    fn pubsub(handle: &Corestore, _con: &mut ClientContext, act: &[Data]) {
        match act[0].to_ascii_uppercase().as_slice() {
            b"CHANNELS" => {
                if act.len() > 2 {
                    return err(responses::ERR_SYNTAX);
                }
                Ok(Response::str_array(
                    handle.pubsub().active_channels(act.get(1)),
                ))
            }
            b"NUMSUB" => {
                let mut flat = Vec::with_capacity((act.len() - 1) * 2);
                for channel in &act[1..] {
                    flat.push(Response::Bulk(channel.clone()));
                    flat.push(Response::Integer(
                        handle.pubsub().channel_subscribers(channel.as_ref()) as i64,
                    ));
                }
                Ok(Response::Array(flat))
            }
            b"NUMPAT" => {
                if act.len() != 1 {
                    return err(responses::ERR_SYNTAX);
                }
                Ok(Response::Integer(handle.pubsub().pattern_count() as i64))
            }
            other => err(format!(
                "ERR Unknown PUBSUB subcommand or wrong number of arguments for '{}'",
                String::from_utf8_lossy(other)
            )),
        }
    }
}
