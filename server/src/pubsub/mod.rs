/*
 * Created on Thu Jul 08 2021
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

//! # Publish/subscribe fan-out
//!
//! Two indexes: channel -> subscribers and pattern -> subscribers. A
//! subscriber is a connection id paired with the sending half of that
//! connection's message queue; delivery is just pushing a pre-encoded
//! frame onto the queue. Dead queues (the connection went away without
//! unsubscribing) are pruned on the next publish that touches them.

use crate::corestore::{glob_matches, Data};
use crate::resp::Response;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::UnboundedSender;

/// The enqueue-to-socket half of a connection
pub type Subscriber = UnboundedSender<Bytes>;

#[derive(Default)]
pub struct PubSub {
    channels: RwLock<HashMap<Data, HashMap<u64, Subscriber>>>,
    patterns: RwLock<HashMap<Data, HashMap<u64, Subscriber>>>,
}

fn message_frame(channel: &Data, payload: &Data) -> Bytes {
    Response::Array(vec![
        Response::Bulk(Data::from("message")),
        Response::Bulk(channel.clone()),
        Response::Bulk(payload.clone()),
    ])
    .into_bytes()
}

fn pmessage_frame(pattern: &Data, channel: &Data, payload: &Data) -> Bytes {
    Response::Array(vec![
        Response::Bulk(Data::from("pmessage")),
        Response::Bulk(pattern.clone()),
        Response::Bulk(channel.clone()),
        Response::Bulk(payload.clone()),
    ])
    .into_bytes()
}

impl PubSub {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subscribe(&self, id: u64, channel: Data, tx: Subscriber) {
        self.channels
            .write()
            .entry(channel)
            .or_default()
            .insert(id, tx);
    }
    pub fn unsubscribe(&self, id: u64, channel: &[u8]) {
        let mut channels = self.channels.write();
        if let Some(subs) = channels.get_mut(channel) {
            subs.remove(&id);
            if subs.is_empty() {
                channels.remove(channel);
            }
        }
    }
    pub fn psubscribe(&self, id: u64, pattern: Data, tx: Subscriber) {
        self.patterns
            .write()
            .entry(pattern)
            .or_default()
            .insert(id, tx);
    }
    pub fn punsubscribe(&self, id: u64, pattern: &[u8]) {
        let mut patterns = self.patterns.write();
        if let Some(subs) = patterns.get_mut(pattern) {
            subs.remove(&id);
            if subs.is_empty() {
                patterns.remove(pattern);
            }
        }
    }
    /// Deliver to every direct subscriber and every matching pattern
    /// subscriber. Returns the number of deliveries
    pub fn publish(&self, channel: &Data, payload: &Data) -> usize {
        let mut delivered = 0;
        {
            let mut channels = self.channels.write();
            if let Some(subs) = channels.get_mut(channel.as_ref()) {
                let frame = message_frame(channel, payload);
                subs.retain(|_, tx| tx.send(frame.clone()).is_ok());
                delivered += subs.len();
                if subs.is_empty() {
                    channels.remove(channel.as_ref());
                }
            }
        }
        {
            let mut patterns = self.patterns.write();
            let mut drained: Vec<Data> = Vec::new();
            for (pattern, subs) in patterns.iter_mut() {
                if glob_matches(pattern.as_ref(), channel.as_ref()) {
                    let frame = pmessage_frame(pattern, channel, payload);
                    subs.retain(|_, tx| tx.send(frame.clone()).is_ok());
                    delivered += subs.len();
                    if subs.is_empty() {
                        drained.push(pattern.clone());
                    }
                }
            }
            for pattern in drained {
                patterns.remove(pattern.as_ref());
            }
        }
        delivered
    }
    /// Tear down everything a disconnecting client had
    pub fn drop_client(&self, id: u64, channels: &HashSet<Data>, patterns: &HashSet<Data>) {
        for channel in channels {
            self.unsubscribe(id, channel.as_ref());
        }
        for pattern in patterns {
            self.punsubscribe(id, pattern.as_ref());
        }
    }
    /// Subscriber count of one channel (`PUBSUB NUMSUB`)
    pub fn channel_subscribers(&self, channel: &[u8]) -> usize {
        self.channels
            .read()
            .get(channel)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
    /// Channels with at least one subscriber, optionally glob-filtered
    /// (`PUBSUB CHANNELS`)
    pub fn active_channels(&self, pattern: Option<&Data>) -> Vec<Data> {
        self.channels
            .read()
            .keys()
            .filter(|channel| match pattern {
                Some(pattern) => glob_matches(pattern.as_ref(), channel.as_ref()),
                None => true,
            })
            .cloned()
            .collect()
    }
    /// Number of unique patterns with subscribers (`PUBSUB NUMPAT`)
    pub fn pattern_count(&self) -> usize {
        self.patterns.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_publish_counts_channel_and_pattern_subscribers() {
        let ps = PubSub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        ps.subscribe(1, Data::from("news.tech"), tx1);
        ps.psubscribe(2, Data::from("news.*"), tx2);
        let n = ps.publish(&Data::from("news.tech"), &Data::from("hello"));
        assert_eq!(n, 2);
        let direct = rx1.try_recv().unwrap();
        assert!(direct.as_ref().starts_with(b"*3\r\n$7\r\nmessage\r\n"));
        let via_pattern = rx2.try_recv().unwrap();
        assert!(via_pattern.as_ref().starts_with(b"*4\r\n$8\r\npmessage\r\n"));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let ps = PubSub::new();
        assert_eq!(ps.publish(&Data::from("nobody"), &Data::from("x")), 0);
    }

    #[test]
    fn test_unsubscribe_prunes_tables() {
        let ps = PubSub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        ps.subscribe(7, Data::from("ch"), tx);
        assert_eq!(ps.channel_subscribers(b"ch"), 1);
        ps.unsubscribe(7, b"ch");
        assert_eq!(ps.channel_subscribers(b"ch"), 0);
        assert!(ps.active_channels(None).is_empty());
    }

    #[test]
    fn test_dead_subscriber_is_pruned_on_publish() {
        let ps = PubSub::new();
        let (tx, rx) = mpsc::unbounded_channel();
        ps.subscribe(9, Data::from("ch"), tx);
        drop(rx);
        assert_eq!(ps.publish(&Data::from("ch"), &Data::from("x")), 0);
        assert!(ps.active_channels(None).is_empty());
    }
}
