/*
 * Created on Wed Jun 16 2021
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

//! # The sorted set engine
//!
//! A [`SortedSet`] keeps two coordinated indexes over its members: a plain
//! member -> score table for O(1) score lookups, and a rank-aware skip list
//! ordered by `(score, member)` ascending. The skip list stores, for every
//! link, the number of level-0 hops that link covers ("span"), which is what
//! makes rank queries and rank ranges O(log n) instead of O(n).
//!
//! The skip list is arena-backed: nodes live in a `Vec` and links are `u32`
//! indexes into it, with a free list for recycling. Index 0 is the head
//! sentinel and is never a real member.

use crate::corestore::Data;
use rand::Rng;
use std::collections::HashMap;

/// Height cap for the skip list. 2^32 elements would be needed to saturate
/// this with p = 1/4
const SKIPLIST_MAX_LEVEL: usize = 32;
/// Probability of a node being promoted to the next level
const SKIPLIST_P: f64 = 0.25;
/// The "null" node index
const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Link {
    /// index of the next node at this level (NIL at the end)
    next: u32,
    /// number of level-0 hops from this node to `next`
    span: usize,
}

#[derive(Debug, Clone)]
struct Node {
    member: Data,
    score: f64,
    /// level-0 predecessor (NIL for the first element)
    backward: u32,
    /// one link per level this node participates in
    links: Vec<Link>,
}

/// An inclusive or exclusive bound on a score range. `+inf`/`-inf` travel
/// through as ordinary floats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
}

impl ScoreBound {
    /// Does `score` satisfy this bound when used as a minimum?
    pub fn allows_from_below(&self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(v) => score >= *v,
            ScoreBound::Exclusive(v) => score > *v,
        }
    }
    /// Does `score` satisfy this bound when used as a maximum?
    pub fn allows_from_above(&self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(v) => score <= *v,
            ScoreBound::Exclusive(v) => score < *v,
        }
    }
}

/// A bound on a lexicographical range. Only meaningful when every member in
/// the set carries the same score; that precondition is the caller's business
#[derive(Debug, Clone, PartialEq)]
pub enum LexBound {
    NegInfinity,
    PosInfinity,
    Inclusive(Data),
    Exclusive(Data),
}

impl LexBound {
    fn allows_from_below(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInfinity => true,
            LexBound::PosInfinity => false,
            LexBound::Inclusive(v) => member >= v.as_ref(),
            LexBound::Exclusive(v) => member > v.as_ref(),
        }
    }
    fn allows_from_above(&self, member: &[u8]) -> bool {
        match self {
            LexBound::NegInfinity => false,
            LexBound::PosInfinity => true,
            LexBound::Inclusive(v) => member <= v.as_ref(),
            LexBound::Exclusive(v) => member < v.as_ref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortedSet {
    /// member -> score
    scores: HashMap<Data, f64>,
    /// node arena; nodes[0] is the head sentinel
    nodes: Vec<Node>,
    /// recycled arena slots
    free: Vec<u32>,
    /// index of the last element (NIL when empty)
    tail: u32,
    /// current number of levels in use (always >= 1)
    level: usize,
    /// number of elements
    length: usize,
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SortedSet {
    pub fn new() -> Self {
        let head = Node {
            member: Data::empty(),
            score: 0.0,
            backward: NIL,
            links: vec![
                Link { next: NIL, span: 0 };
                SKIPLIST_MAX_LEVEL
            ],
        };
        SortedSet {
            scores: HashMap::new(),
            nodes: vec![head],
            free: Vec::new(),
            tail: NIL,
            level: 1,
            length: 0,
        }
    }
    /// Build a sorted set from `(member, score)` pairs. Later duplicates of
    /// a member overwrite earlier ones
    pub fn from_entries(entries: Vec<(Data, f64)>) -> Self {
        let mut zs = Self::new();
        for (member, score) in entries {
            zs.insert(member, score);
        }
        zs
    }
    pub fn len(&self) -> usize {
        self.length
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }
    /// Insert a member or update its score. Returns true if the member is new
    pub fn insert(&mut self, member: Data, score: f64) -> bool {
        match self.scores.get(member.as_ref()).copied() {
            Some(old) => {
                if old != score {
                    self.skip_remove(old, member.as_ref());
                    self.skip_insert(score, member.clone());
                    self.scores.insert(member, score);
                }
                false
            }
            None => {
                self.skip_insert(score, member.clone());
                self.scores.insert(member, score);
                true
            }
        }
    }
    /// Remove a member. Returns true if it was present
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.skip_remove(score, member);
                true
            }
            None => false,
        }
    }
    /// 0-based rank of a member in `(score, member)` order
    pub fn rank(&self, member: &[u8], reverse: bool) -> Option<usize> {
        let score = self.score(member)?;
        let fwd = self.forward_rank(score, member)?;
        if reverse {
            Some(self.length - 1 - fwd)
        } else {
            Some(fwd)
        }
    }
    /// Collect the inclusive rank range `[start, stop]` in ascending order.
    /// Both indexes must already be normalized (0-based, start <= stop)
    pub fn range_by_rank(&self, start: usize, stop: usize) -> Vec<(Data, f64)> {
        if start >= self.length {
            return Vec::new();
        }
        let stop = stop.min(self.length - 1);
        let mut out = Vec::with_capacity(stop - start + 1);
        let mut idx = self.node_at_rank(start);
        let mut remaining = stop - start + 1;
        while idx != NIL && remaining > 0 {
            let n = self.node(idx);
            out.push((n.member.clone(), n.score));
            idx = n.links[0].next;
            remaining -= 1;
        }
        out
    }
    /// Collect members within a score range. `reverse` walks from the high
    /// end; `offset`/`count` apply after direction is fixed. A negative
    /// `count` means "no limit"
    pub fn range_by_score(
        &self,
        min: &ScoreBound,
        max: &ScoreBound,
        reverse: bool,
        offset: usize,
        count: i64,
    ) -> Vec<(Data, f64)> {
        let mut out = Vec::new();
        let mut skipped = 0usize;
        if !reverse {
            let mut idx = self.first_in_score_range(min);
            while idx != NIL {
                let n = self.node(idx);
                if !max.allows_from_above(n.score) {
                    break;
                }
                if skipped < offset {
                    skipped += 1;
                } else {
                    if count >= 0 && out.len() as i64 >= count {
                        break;
                    }
                    out.push((n.member.clone(), n.score));
                }
                idx = n.links[0].next;
            }
        } else {
            let mut idx = self.last_in_score_range(max);
            while idx != NIL {
                let n = self.node(idx);
                if !min.allows_from_below(n.score) {
                    break;
                }
                if skipped < offset {
                    skipped += 1;
                } else {
                    if count >= 0 && out.len() as i64 >= count {
                        break;
                    }
                    out.push((n.member.clone(), n.score));
                }
                idx = n.backward;
            }
        }
        out
    }
    /// Collect members within a lexicographical range, comparing members
    /// only. Assumes all scores are equal (the ZRANGEBYLEX precondition)
    pub fn range_by_lex(
        &self,
        min: &LexBound,
        max: &LexBound,
        reverse: bool,
        offset: usize,
        count: i64,
    ) -> Vec<(Data, f64)> {
        let mut out = Vec::new();
        let mut skipped = 0usize;
        if !reverse {
            let mut idx = self.first_in_lex_range(min);
            while idx != NIL {
                let n = self.node(idx);
                if !max.allows_from_above(n.member.as_ref()) {
                    break;
                }
                if skipped < offset {
                    skipped += 1;
                } else {
                    if count >= 0 && out.len() as i64 >= count {
                        break;
                    }
                    out.push((n.member.clone(), n.score));
                }
                idx = n.links[0].next;
            }
        } else {
            let mut idx = self.last_in_lex_range(max);
            while idx != NIL {
                let n = self.node(idx);
                if !min.allows_from_below(n.member.as_ref()) {
                    break;
                }
                if skipped < offset {
                    skipped += 1;
                } else {
                    if count >= 0 && out.len() as i64 >= count {
                        break;
                    }
                    out.push((n.member.clone(), n.score));
                }
                idx = n.backward;
            }
        }
        out
    }
    /// Number of members within a score range, computed from ranks in
    /// O(log n)
    pub fn count_in_score_range(&self, min: &ScoreBound, max: &ScoreBound) -> usize {
        let below_max = self.rank_of_first_beyond_max(max);
        let below_min = self.rank_of_first_in_min(min);
        below_max.saturating_sub(below_min)
    }
    /// Pop up to `count` elements from the low end
    pub fn pop_min(&mut self, count: usize) -> Vec<(Data, f64)> {
        let mut out = Vec::new();
        for _ in 0..count {
            let idx = self.node(0).links[0].next;
            if idx == NIL {
                break;
            }
            let (member, score) = {
                let n = self.node(idx);
                (n.member.clone(), n.score)
            };
            self.remove(member.as_ref());
            out.push((member, score));
        }
        out
    }
    /// Pop up to `count` elements from the high end
    pub fn pop_max(&mut self, count: usize) -> Vec<(Data, f64)> {
        let mut out = Vec::new();
        for _ in 0..count {
            let idx = self.tail;
            if idx == NIL {
                break;
            }
            let (member, score) = {
                let n = self.node(idx);
                (n.member.clone(), n.score)
            };
            self.remove(member.as_ref());
            out.push((member, score));
        }
        out
    }
    /// Iterate all `(member, score)` pairs in rank order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            zs: self,
            cur: self.node(0).links[0].next,
        }
    }
}

// skip list internals
impl SortedSet {
    fn node(&self, idx: u32) -> &Node {
        &self.nodes[idx as usize]
    }
    fn node_mut(&mut self, idx: u32) -> &mut Node {
        &mut self.nodes[idx as usize]
    }
    fn random_level(&self) -> usize {
        let mut rng = rand::thread_rng();
        let mut lvl = 1;
        while lvl < SKIPLIST_MAX_LEVEL && rng.gen::<f64>() < SKIPLIST_P {
            lvl += 1;
        }
        lvl
    }
    fn alloc(&mut self, node: Node) -> u32 {
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }
    /// For every level, find the rightmost node that sorts before
    /// `(score, member)` along with its rank
    fn find_update_path(
        &self,
        score: f64,
        member: &[u8],
    ) -> ([u32; SKIPLIST_MAX_LEVEL], [usize; SKIPLIST_MAX_LEVEL]) {
        let mut update = [0u32; SKIPLIST_MAX_LEVEL];
        let mut rank = [0usize; SKIPLIST_MAX_LEVEL];
        let mut x = 0u32;
        for lvl in (0..self.level).rev() {
            rank[lvl] = if lvl + 1 == self.level { 0 } else { rank[lvl + 1] };
            loop {
                let link = self.node(x).links[lvl];
                if link.next == NIL {
                    break;
                }
                let nxt = self.node(link.next);
                if nxt.score < score
                    || (nxt.score == score && nxt.member.as_ref() < member)
                {
                    rank[lvl] += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            update[lvl] = x;
        }
        (update, rank)
    }
    fn skip_insert(&mut self, score: f64, member: Data) {
        let (mut update, mut rank) = self.find_update_path(score, member.as_ref());
        let lvl = self.random_level();
        if lvl > self.level {
            for i in self.level..lvl {
                rank[i] = 0;
                update[i] = 0;
                // the head link at a fresh level spans the whole list
                self.node_mut(0).links[i].span = self.length;
            }
            self.level = lvl;
        }
        let backward = if update[0] == 0 { NIL } else { update[0] };
        let idx = self.alloc(Node {
            member,
            score,
            backward,
            links: vec![Link { next: NIL, span: 0 }; lvl],
        });
        for i in 0..lvl {
            let u = update[i];
            let u_next = self.node(u).links[i].next;
            let u_span = self.node(u).links[i].span;
            {
                let n = self.node_mut(idx);
                n.links[i].next = u_next;
                n.links[i].span = u_span - (rank[0] - rank[i]);
            }
            let un = self.node_mut(u);
            un.links[i].next = idx;
            un.links[i].span = (rank[0] - rank[i]) + 1;
        }
        // untouched higher levels now skip one more node
        for i in lvl..self.level {
            let u = update[i];
            self.node_mut(u).links[i].span += 1;
        }
        let next0 = self.node(idx).links[0].next;
        if next0 == NIL {
            self.tail = idx;
        } else {
            self.node_mut(next0).backward = idx;
        }
        self.length += 1;
    }
    fn skip_remove(&mut self, score: f64, member: &[u8]) -> bool {
        let (update, _) = self.find_update_path(score, member);
        let x = self.node(update[0]).links[0].next;
        if x == NIL {
            return false;
        }
        {
            let xn = self.node(x);
            if xn.score != score || xn.member.as_ref() != member {
                return false;
            }
        }
        for i in 0..self.level {
            let u = update[i];
            if self.node(u).links[i].next == x {
                let x_span = self.node(x).links[i].span;
                let x_next = self.node(x).links[i].next;
                let un = self.node_mut(u);
                un.links[i].span += x_span;
                un.links[i].span -= 1;
                un.links[i].next = x_next;
            } else {
                self.node_mut(u).links[i].span -= 1;
            }
        }
        let x_next = self.node(x).links[0].next;
        let x_back = self.node(x).backward;
        if x_next == NIL {
            self.tail = x_back;
        } else {
            self.node_mut(x_next).backward = x_back;
        }
        while self.level > 1 && self.node(0).links[self.level - 1].next == NIL {
            self.level -= 1;
        }
        // recycle the slot, dropping the member blob
        self.nodes[x as usize] = Node {
            member: Data::empty(),
            score: 0.0,
            backward: NIL,
            links: Vec::new(),
        };
        self.free.push(x);
        self.length -= 1;
        true
    }
    /// 0-based rank of an existing `(score, member)` pair
    fn forward_rank(&self, score: f64, member: &[u8]) -> Option<usize> {
        let mut x = 0u32;
        let mut rank = 0usize;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next == NIL {
                    break;
                }
                let nxt = self.node(link.next);
                if nxt.score < score
                    || (nxt.score == score && nxt.member.as_ref() <= member)
                {
                    rank += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if x != 0 {
                let n = self.node(x);
                if n.score == score && n.member.as_ref() == member {
                    return Some(rank - 1);
                }
            }
        }
        None
    }
    fn node_at_rank(&self, rank: usize) -> u32 {
        if rank >= self.length {
            return NIL;
        }
        let target = rank + 1;
        let mut x = 0u32;
        let mut traversed = 0usize;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL && traversed + link.span <= target {
                    traversed += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
            if traversed == target {
                return x;
            }
        }
        NIL
    }
    fn first_in_score_range(&self, min: &ScoreBound) -> u32 {
        let mut x = 0u32;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL && !min.allows_from_below(self.node(link.next).score) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        self.node(x).links[0].next
    }
    fn last_in_score_range(&self, max: &ScoreBound) -> u32 {
        let mut x = 0u32;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL && max.allows_from_above(self.node(link.next).score) {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        if x == 0 {
            NIL
        } else {
            x
        }
    }
    fn first_in_lex_range(&self, min: &LexBound) -> u32 {
        let mut x = 0u32;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL
                    && !min.allows_from_below(self.node(link.next).member.as_ref())
                {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        self.node(x).links[0].next
    }
    fn last_in_lex_range(&self, max: &LexBound) -> u32 {
        let mut x = 0u32;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL
                    && max.allows_from_above(self.node(link.next).member.as_ref())
                {
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        if x == 0 {
            NIL
        } else {
            x
        }
    }
    /// Number of elements that do NOT satisfy `min` (they sort before the
    /// range)
    fn rank_of_first_in_min(&self, min: &ScoreBound) -> usize {
        let mut x = 0u32;
        let mut rank = 0usize;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL && !min.allows_from_below(self.node(link.next).score) {
                    rank += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        rank
    }
    /// Number of elements that satisfy `max`
    fn rank_of_first_beyond_max(&self, max: &ScoreBound) -> usize {
        let mut x = 0u32;
        let mut rank = 0usize;
        for lvl in (0..self.level).rev() {
            loop {
                let link = self.node(x).links[lvl];
                if link.next != NIL && max.allows_from_above(self.node(link.next).score) {
                    rank += link.span;
                    x = link.next;
                } else {
                    break;
                }
            }
        }
        rank
    }
}

pub struct Iter<'a> {
    zs: &'a SortedSet,
    cur: u32,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Data, f64);
    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let n = self.zs.node(self.cur);
        self.cur = n.links[0].next;
        Some((&n.member, n.score))
    }
}
