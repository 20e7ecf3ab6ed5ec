// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Subscription (§4.3): the mutable set of message ids a pipe owns.
//!
//! Mirrors `examples/original_source/inc/etfw/msg/Subscription.hpp`'s
//! `vector<MsgId_t>` backing store: a plain `Vec<u32>`, O(n) membership
//! and mutation, duplicates permitted.

/// An ordered collection of message ids owned by one pipe.
#[derive(Debug, Default, Clone)]
pub struct Subscription {
    ids: Vec<u32>,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    /// Monotonic mutation; duplicates are permitted (§3).
    pub fn subscribe(&mut self, id: u32) {
        self.ids.push(id);
    }

    pub fn unsubscribe(&mut self, id: u32) {
        self.ids.retain(|&existing| existing != id);
    }

    pub fn has(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    /// A snapshot view over the current ids, valid for one broker `send`
    /// call (§4.3).
    pub fn view(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
