//! SkipList Module
//!
//! Probabilistic ordered index over arena-resident rows.
//!
//! ## Responsibilities
//! - Locate a row with an equal key, or link the new row in order
//! - Forward, in-order iteration for flush
//! - Never merge: callers act on the returned handle
//!
//! ## Structure
//! Nodes live in one `Vec` and link to each other by index, so the index
//! owns no pointers into the arena, only `ArenaHandle`s.
//! ```text
//! level 2: HEAD ─────────────────────► n3 ─────────────► NIL
//! level 1: HEAD ─────────► n1 ───────► n3 ───► n4 ─────► NIL
//! level 0: HEAD ─► n2 ───► n1 ─► n5 ─► n3 ───► n4 ─► n6 ► NIL
//! ```
//!
//! When duplicates are allowed, each node's key is extended with its
//! insertion sequence, so equal keys never collide and iterate in the
//! order they were inserted.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arena::{Arena, ArenaHandle};
use crate::row::Comparator;

const NIL: u32 = u32::MAX;
const HEAD: u32 = 0;

/// Hard cap on tower height
pub const MAX_HEIGHT_LIMIT: usize = 32;

struct Node {
    /// `None` only for the head sentinel
    row: Option<ArenaHandle>,
    /// Insertion sequence, tie-breaker for duplicate keys
    seq: u64,
    next: Vec<u32>,
}

/// Ordered map from row bytes to row bytes, keyed by a `Comparator`
pub struct SkipList<C: Comparator> {
    comparator: C,
    row_size: usize,
    allow_duplicates: bool,
    nodes: Vec<Node>,
    height: usize,
    max_height: usize,
    branching: u32,
    next_seq: u64,
    rng: StdRng,
}

impl<C: Comparator> SkipList<C> {
    pub fn new(
        comparator: C,
        row_size: usize,
        allow_duplicates: bool,
        max_height: usize,
        branching: u32,
        seed: u64,
    ) -> Self {
        let max_height = max_height.clamp(1, MAX_HEIGHT_LIMIT);
        let head = Node {
            row: None,
            seq: 0,
            next: vec![NIL; max_height],
        };
        Self {
            comparator,
            row_size,
            allow_duplicates,
            nodes: vec![head],
            height: 1,
            max_height,
            branching: branching.max(2),
            next_seq: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Link `row` into the index unless a row with an equal key exists
    ///
    /// Returns the resident row and whether it already existed. On
    /// `false` the index now owns `row`; on `true` nothing changed and the
    /// caller may merge into the returned row.
    pub fn insert_or_locate(&mut self, row: ArenaHandle, arena: &mut Arena) -> (ArenaHandle, bool) {
        let seq = self.next_seq;
        let mut prev = [HEAD; MAX_HEIGHT_LIMIT];
        let prev = &mut prev[..self.max_height];

        let mut x = HEAD;
        for level in (0..self.height).rev() {
            loop {
                let next = self.nodes[x as usize].next[level];
                if next != NIL && self.compare_node(next, row, seq, arena) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
            prev[level] = x;
        }

        if !self.allow_duplicates {
            let candidate = self.nodes[x as usize].next[0];
            if candidate != NIL && self.compare_node(candidate, row, seq, arena) == Ordering::Equal {
                return (self.row_of(candidate), true);
            }
        }

        let height = self.random_height();
        if height > self.height {
            for slot in prev.iter_mut().take(height).skip(self.height) {
                *slot = HEAD;
            }
            self.height = height;
        }

        let idx = self.nodes.len() as u32;
        let mut next = vec![NIL; height];
        for (level, link) in next.iter_mut().enumerate() {
            let p = prev[level] as usize;
            *link = self.nodes[p].next[level];
            self.nodes[p].next[level] = idx;
        }
        self.nodes.push(Node {
            row: Some(row),
            seq,
            next,
        });
        self.next_seq += 1;

        arena.charge(Self::node_footprint(height));
        (row, false)
    }

    /// Find the resident row with a key equal to `row`'s
    pub fn find(&self, row: ArenaHandle, arena: &Arena) -> Option<ArenaHandle> {
        let mut x = HEAD;
        for level in (0..self.height).rev() {
            loop {
                let next = self.nodes[x as usize].next[level];
                if next != NIL && self.compare_keys(next, row, arena) == Ordering::Less {
                    x = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[x as usize].next[0];
        if candidate != NIL && self.compare_keys(candidate, row, arena) == Ordering::Equal {
            Some(self.row_of(candidate))
        } else {
            None
        }
    }

    /// Rows in ascending order
    pub fn iter(&self) -> Iter<'_, C> {
        Iter {
            list: self,
            cur: self.nodes[HEAD as usize].next[0],
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current tallest tower
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Bytes charged to the arena for a node of `height` levels
    pub fn node_footprint(height: usize) -> u64 {
        (std::mem::size_of::<Node>() + height * std::mem::size_of::<u32>()) as u64
    }

    fn row_of(&self, node: u32) -> ArenaHandle {
        match self.nodes[node as usize].row {
            Some(row) => row,
            None => unreachable!("head sentinel is never linked as a successor"),
        }
    }

    fn compare_keys(&self, node: u32, row: ArenaHandle, arena: &Arena) -> Ordering {
        let resident = arena.slice(self.row_of(node), self.row_size);
        let incoming = arena.slice(row, self.row_size);
        self.comparator.compare(resident, incoming, arena)
    }

    /// Compare a resident node against the row being inserted, extending
    /// the key with the sequence number when duplicates are allowed
    fn compare_node(&self, node: u32, row: ArenaHandle, seq: u64, arena: &Arena) -> Ordering {
        let ordering = self.compare_keys(node, row, arena);
        if self.allow_duplicates {
            ordering.then(self.nodes[node as usize].seq.cmp(&seq))
        } else {
            ordering
        }
    }

    fn random_height(&mut self) -> usize {
        let mut height = 1;
        while height < self.max_height && self.rng.gen_range(0..self.branching) == 0 {
            height += 1;
        }
        height
    }
}

/// Forward iterator over resident rows
pub struct Iter<'a, C: Comparator> {
    list: &'a SkipList<C>,
    cur: u32,
}

impl<C: Comparator> Iterator for Iter<'_, C> {
    type Item = ArenaHandle;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == NIL {
            return None;
        }
        let node = &self.list.nodes[self.cur as usize];
        self.cur = node.next[0];
        node.row
    }
}
