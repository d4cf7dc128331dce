// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! dmabuf-backed frame buffers
//!
//! A [`FrameBuffer`] owns one file descriptor per plane. Ownership moves into
//! a video device when the buffer is queued and comes back through the
//! device's completion listener, so a descriptor is only ever closed when the
//! buffer value holding it is dropped.

use crate::{request::RequestId, stream::StreamId, Error};
use dma_buf::DmaBuf;
use std::{
    fmt,
    os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
};
use unix_ts::Timestamp;

/// One dmabuf-backed memory region of a frame buffer
#[derive(Debug)]
pub struct FramePlane {
    fd: OwnedFd,
    length: u32,
}

impl FramePlane {
    pub fn new(fd: OwnedFd, length: u32) -> Self {
        Self { fd, length }
    }

    pub fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Duplicate the plane descriptor into a [`DmaBuf`] for CPU access.
    ///
    /// The returned handle owns its own descriptor and may outlive the plane.
    pub fn dmabuf(&self) -> Result<DmaBuf, Error> {
        let fd = self.fd.try_clone()?;
        // SAFETY: `fd` is a freshly duplicated descriptor whose ownership is
        // transferred to the DmaBuf.
        Ok(unsafe { DmaBuf::from_raw_fd(fd.into_raw_fd()) })
    }
}

/// Completion status of one capture cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameStatus {
    #[default]
    Success,
    Error,
    Cancelled,
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FrameStatus::Success => write!(f, "success"),
            FrameStatus::Error => write!(f, "error"),
            FrameStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Metadata written once per capture cycle, between queue and dequeue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameMetadata {
    pub status: FrameStatus,
    pub sequence: u32,
    /// Capture time in nanoseconds on the driver's clock
    pub timestamp: u64,
    /// Bytes used per plane
    pub planes: Vec<u32>,
}

#[derive(Debug)]
pub struct FrameBuffer {
    planes: Vec<FramePlane>,
    metadata: FrameMetadata,
    request: Option<RequestId>,
    stream: Option<StreamId>,
    cookie: u64,
}

impl FrameBuffer {
    pub fn new(planes: Vec<FramePlane>) -> Self {
        let metadata = FrameMetadata {
            planes: vec![0; planes.len()],
            ..Default::default()
        };
        Self {
            planes,
            metadata,
            request: None,
            stream: None,
            cookie: 0,
        }
    }

    pub fn planes(&self) -> &[FramePlane] {
        &self.planes
    }

    /// Plane identities as (descriptor, length) pairs, in plane order.
    pub fn plane_ids(&self) -> Vec<(RawFd, u32)> {
        self.planes
            .iter()
            .map(|plane| (plane.raw_fd(), plane.length()))
            .collect()
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Mutable metadata. Output devices read sequence, timestamp and the
    /// per-plane bytes used from here when the buffer is queued.
    pub fn metadata_mut(&mut self) -> &mut FrameMetadata {
        &mut self.metadata
    }

    /// The request this buffer is attached to, if any
    pub fn request(&self) -> Option<RequestId> {
        self.request
    }

    /// The stream this buffer belongs to, if any
    pub fn stream(&self) -> Option<StreamId> {
        self.stream
    }

    pub(crate) fn attach(&mut self, request: Option<RequestId>, stream: Option<StreamId>) {
        self.request = request;
        self.stream = stream;
    }

    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn set_cookie(&mut self, cookie: u64) {
        self.cookie = cookie;
    }

    pub fn timestamp(&self) -> Timestamp {
        let ts = self.metadata.timestamp;
        Timestamp::new((ts / 1_000_000_000) as i64, (ts % 1_000_000_000) as u32)
    }
}

impl fmt::Display for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, plane) in self.planes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "fd:{} len:{}", plane.raw_fd(), plane.length())?;
        }
        write!(
            f,
            "] seq:{} {}",
            self.metadata.sequence, self.metadata.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn plane(length: u32) -> FramePlane {
        let file = File::open("/dev/null").unwrap();
        FramePlane::new(OwnedFd::from(file), length)
    }

    #[test]
    fn test_new_buffer_metadata() {
        let buffer = FrameBuffer::new(vec![plane(4096), plane(2048)]);
        assert_eq!(buffer.planes().len(), 2);
        assert_eq!(buffer.metadata().planes, vec![0, 0]);
        assert_eq!(buffer.metadata().status, FrameStatus::Success);
        assert_eq!(buffer.request(), None);
    }

    #[test]
    fn test_plane_ids_follow_plane_order() {
        let buffer = FrameBuffer::new(vec![plane(100), plane(50)]);
        let ids = buffer.plane_ids();
        assert_eq!(ids[0].1, 100);
        assert_eq!(ids[1].1, 50);
        assert_ne!(ids[0].0, ids[1].0);
    }

    #[test]
    fn test_timestamp_split() {
        let mut buffer = FrameBuffer::new(vec![plane(16)]);
        buffer.metadata_mut().timestamp = 3_000_000_250;
        assert_eq!(buffer.timestamp(), Timestamp::new(3, 250));
    }
}
