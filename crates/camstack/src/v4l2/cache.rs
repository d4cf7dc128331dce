// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Frame buffer to V4L2 buffer index affinity.
//!
//! The kernel keeps dmabufs mapped to the V4L2 buffer index they were last
//! queued on. [`V4L2BufferCache`] hands out indices so that a recurring
//! frame buffer lands on the index that already maps its planes, and only
//! falls back to another free index when no such entry exists.

use crate::framebuffer::FrameBuffer;
use log::{debug, warn};
use std::os::fd::RawFd;

#[derive(Debug, Clone, Default)]
struct Entry {
    free: bool,
    planes: Vec<(RawFd, u32)>,
}

impl Entry {
    fn matches(&self, buffer: &FrameBuffer) -> bool {
        let planes = buffer.planes();
        self.planes.len() == planes.len()
            && self
                .planes
                .iter()
                .zip(planes)
                .all(|(&(fd, length), plane)| fd == plane.raw_fd() && length == plane.length())
    }
}

#[derive(Debug)]
pub struct V4L2BufferCache {
    entries: Vec<Entry>,
    misses: u64,
}

impl V4L2BufferCache {
    /// Cache of `count` free entries with no recorded planes, used for
    /// imported buffers.
    pub fn new(count: usize) -> Self {
        Self {
            entries: vec![
                Entry {
                    free: true,
                    planes: Vec::new(),
                };
                count
            ],
            misses: 0,
        }
    }

    /// Cache pre-populated with the planes of `buffers`, entry `i` recording
    /// buffer `i`. Entries start free, so queueing an exported buffer always
    /// hits its own index.
    pub fn from_buffers(buffers: &[FrameBuffer]) -> Self {
        Self {
            entries: buffers
                .iter()
                .map(|buffer| Entry {
                    free: true,
                    planes: buffer.plane_ids(),
                })
                .collect(),
            misses: 0,
        }
    }

    /// Find the index to queue `buffer` on.
    ///
    /// Prefers a free entry that last held the same planes. Otherwise the
    /// lowest free index is used and counted as a miss. `None` means every
    /// entry is in use and the caller must retry later.
    pub fn get(&mut self, buffer: &FrameBuffer) -> Option<usize> {
        let mut hit = None;
        let mut first_free = None;

        for (index, entry) in self.entries.iter().enumerate() {
            if !entry.free {
                continue;
            }
            if first_free.is_none() {
                first_free = Some(index);
            }
            if entry.matches(buffer) {
                hit = Some(index);
                break;
            }
        }

        let index = match hit {
            Some(index) => index,
            None => {
                let index = first_free?;
                self.misses += 1;
                index
            }
        };

        self.entries[index] = Entry {
            free: false,
            planes: buffer.plane_ids(),
        };

        Some(index)
    }

    /// Mark `index` free, keeping its planes for later hits.
    pub fn put(&mut self, index: usize) {
        match self.entries.get_mut(index) {
            Some(entry) if !entry.free => entry.free = true,
            Some(_) => warn!("Buffer cache entry {} is already free", index),
            None => warn!(
                "Buffer cache index {} out of range ({} entries)",
                index,
                self.entries.len()
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_free(&self, index: usize) -> bool {
        self.entries.get(index).is_some_and(|entry| entry.free)
    }

    /// Number of entries currently bound to a queued buffer
    pub fn bound(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.free).count()
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl Drop for V4L2BufferCache {
    fn drop(&mut self) {
        if self.misses > self.entries.len() as u64 {
            debug!("Cache misses: {}", self.misses);
        }
    }
}
