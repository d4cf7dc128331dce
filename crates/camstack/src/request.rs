// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Capture requests
//!
//! A [`Request`] groups one [`FrameBuffer`] per stream with the controls to
//! apply for that capture. The application creates it from a configured
//! camera, attaches buffers and queues it. The pipeline handler takes the
//! buffers out to queue them on its devices and hands each one back through
//! [`PipelineFramework::complete_buffer`](crate::pipeline::PipelineFramework::complete_buffer)
//! when the hardware is done with it. Requests are returned to the
//! application in queueing order.

use crate::{
    camera::CameraId,
    controls::ControlList,
    framebuffer::{FrameBuffer, FrameStatus},
    stream::StreamId,
    Error,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    error, fmt,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Complete,
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Complete => write!(f, "complete"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug)]
pub struct Request {
    id: RequestId,
    camera: CameraId,
    cookie: u64,
    status: RequestStatus,
    buffers: BTreeMap<StreamId, FrameBuffer>,
    pending: BTreeSet<StreamId>,
    cancelled: bool,
    controls: ControlList,
    metadata: ControlList,
}

impl Request {
    pub(crate) fn new(camera: CameraId, cookie: u64, controls: ControlList) -> Self {
        Self {
            id: RequestId::next(),
            camera,
            cookie,
            status: RequestStatus::Pending,
            buffers: BTreeMap::new(),
            pending: BTreeSet::new(),
            cancelled: false,
            controls,
            metadata: ControlList::new(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// Opaque application value, returned unchanged on completion
    pub fn cookie(&self) -> u64 {
        self.cookie
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    /// Attach `buffer` as the destination for `stream`.
    ///
    /// A request holds at most one buffer per stream.
    pub fn add_buffer(&mut self, stream: StreamId, mut buffer: FrameBuffer) -> Result<(), Error> {
        if self.buffers.contains_key(&stream) || self.pending.contains(&stream) {
            return Err(Error::InvalidArgument(format!(
                "request {} already has a buffer for {}",
                self.id, stream
            )));
        }
        buffer.attach(Some(self.id), Some(stream));
        self.buffers.insert(stream, buffer);
        self.pending.insert(stream);
        Ok(())
    }

    pub fn find_buffer(&self, stream: StreamId) -> Option<&FrameBuffer> {
        self.buffers.get(&stream)
    }

    pub fn find_buffer_mut(&mut self, stream: StreamId) -> Option<&mut FrameBuffer> {
        self.buffers.get_mut(&stream)
    }

    /// Move the buffer for `stream` out of the request, typically to queue
    /// it on a device. The stream stays pending until the buffer is
    /// completed.
    pub fn take_buffer(&mut self, stream: StreamId) -> Option<FrameBuffer> {
        self.buffers.remove(&stream)
    }

    /// Put back a buffer taken with [`Request::take_buffer`] that could not
    /// be queued.
    pub fn restore_buffer(&mut self, buffer: FrameBuffer) -> Result<(), Error> {
        match (buffer.request(), buffer.stream()) {
            (Some(request), Some(stream))
                if request == self.id
                    && self.pending.contains(&stream)
                    && !self.buffers.contains_key(&stream) =>
            {
                self.buffers.insert(stream, buffer);
                Ok(())
            }
            _ => Err(Error::InvalidArgument(format!(
                "buffer was not taken from request {}",
                self.id
            ))),
        }
    }

    pub fn buffers(&self) -> impl Iterator<Item = (&StreamId, &FrameBuffer)> {
        self.buffers.iter()
    }

    /// Every stream this request carries a buffer for, whether held or taken
    pub fn streams(&self) -> Vec<StreamId> {
        self.buffers
            .keys()
            .chain(self.pending.iter())
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_pending_buffers(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True when a buffer was taken out and has not come back yet
    pub fn has_buffers_in_flight(&self) -> bool {
        self.pending
            .iter()
            .any(|stream| !self.buffers.contains_key(stream))
    }

    /// Complete every pending buffer the request still holds as cancelled.
    /// Buffers in flight stay pending.
    pub(crate) fn cancel_held(&mut self) {
        for (stream, buffer) in self.buffers.iter_mut() {
            if self.pending.remove(stream) {
                buffer.metadata_mut().status = FrameStatus::Cancelled;
            }
        }
        self.cancelled = true;
    }

    /// Return a completed buffer to its request.
    ///
    /// Returns true when this was the last pending buffer. A cancelled
    /// buffer marks the whole request cancelled.
    pub(crate) fn complete_buffer(&mut self, buffer: FrameBuffer) -> Result<bool, Error> {
        let stream = match (buffer.request(), buffer.stream()) {
            (Some(request), Some(stream)) if request == self.id => stream,
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "buffer does not belong to request {}",
                    self.id
                )))
            }
        };
        if !self.pending.remove(&stream) {
            return Err(Error::InvalidState(format!(
                "request {} has no pending buffer for {}",
                self.id, stream
            )));
        }
        if buffer.metadata().status == FrameStatus::Cancelled {
            self.cancelled = true;
        }
        self.buffers.insert(stream, buffer);
        Ok(self.pending.is_empty())
    }

    pub(crate) fn complete(&mut self) {
        self.status = if self.cancelled {
            RequestStatus::Cancelled
        } else {
            RequestStatus::Complete
        };
    }

    /// Reset a completed request so it can be queued again with the same
    /// buffers. The id and cookie are preserved.
    pub fn reuse(&mut self) {
        self.status = RequestStatus::Pending;
        self.cancelled = false;
        self.pending = self.buffers.keys().copied().collect();
        self.metadata.clear();
    }

    pub fn controls(&self) -> &ControlList {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut ControlList {
        &mut self.controls
    }

    /// Controls reported back by the pipeline handler for this capture
    pub fn metadata(&self) -> &ControlList {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ControlList {
        &mut self.metadata
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Request({}:{}:{})[{}/{}]",
            self.id,
            self.status,
            self.cookie,
            self.buffers.len(),
            self.pending.len()
        )
    }
}

/// A request the camera refused to queue, handed back with the reason
#[derive(Debug)]
pub struct RequestError {
    pub request: Request,
    pub error: Error,
}

impl RequestError {
    pub fn new(request: Request, error: Error) -> Self {
        Self { request, error }
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "request {} not queued: {}", self.request.id, self.error)
    }
}

impl error::Error for RequestError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framebuffer::FramePlane;
    use std::{fs::File, os::fd::OwnedFd};

    fn buffer() -> FrameBuffer {
        let file = File::open("/dev/null").unwrap();
        FrameBuffer::new(vec![FramePlane::new(OwnedFd::from(file), 4096)])
    }

    fn new_request() -> Request {
        Request::new(CameraId::next(), 7, ControlList::new())
    }

    #[test]
    fn test_add_buffer_attaches_request_and_stream() {
        let stream = StreamId::next();
        let mut request = new_request();
        request.add_buffer(stream, buffer()).unwrap();

        let attached = request.find_buffer(stream).unwrap();
        assert_eq!(attached.request(), Some(request.id()));
        assert_eq!(attached.stream(), Some(stream));
        assert!(request.has_pending_buffers());
        assert!(request.add_buffer(stream, buffer()).is_err());
    }

    #[test]
    fn test_complete_buffers_until_done() {
        let a = StreamId::next();
        let b = StreamId::next();
        let mut request = new_request();
        request.add_buffer(a, buffer()).unwrap();
        request.add_buffer(b, buffer()).unwrap();

        let first = request.take_buffer(a).unwrap();
        let second = request.take_buffer(b).unwrap();
        assert_eq!(request.streams(), vec![a, b]);

        assert!(!request.complete_buffer(first).unwrap());
        assert!(request.complete_buffer(second).unwrap());
        request.complete();
        assert_eq!(request.status(), RequestStatus::Complete);
        assert!(request.find_buffer(a).is_some());
    }

    #[test]
    fn test_cancelled_buffer_cancels_request() {
        let stream = StreamId::next();
        let mut request = new_request();
        request.add_buffer(stream, buffer()).unwrap();
        let mut taken = request.take_buffer(stream).unwrap();
        taken.metadata_mut().status = FrameStatus::Cancelled;
        assert!(request.complete_buffer(taken).unwrap());
        request.complete();
        assert_eq!(request.status(), RequestStatus::Cancelled);

        request.reuse();
        assert_eq!(request.status(), RequestStatus::Pending);
        assert!(request.has_pending_buffers());
    }

    #[test]
    fn test_restore_taken_buffer() {
        let stream = StreamId::next();
        let mut request = new_request();
        request.add_buffer(stream, buffer()).unwrap();

        let taken = request.take_buffer(stream).unwrap();
        assert!(request.find_buffer(stream).is_none());
        request.restore_buffer(taken).unwrap();
        assert!(request.find_buffer(stream).is_some());
        assert!(request.restore_buffer(buffer()).is_err());
    }

    #[test]
    fn test_cancel_held_keeps_buffers_in_flight_pending() {
        let a = StreamId::next();
        let b = StreamId::next();
        let mut request = new_request();
        request.add_buffer(a, buffer()).unwrap();
        request.add_buffer(b, buffer()).unwrap();
        assert!(!request.has_buffers_in_flight());

        let in_flight = request.take_buffer(a).unwrap();
        assert!(request.has_buffers_in_flight());
        request.cancel_held();
        assert_eq!(
            request.find_buffer(b).unwrap().metadata().status,
            FrameStatus::Cancelled
        );
        assert!(request.has_pending_buffers());

        assert!(request.complete_buffer(in_flight).unwrap());
        request.complete();
        assert_eq!(request.status(), RequestStatus::Cancelled);
    }

    #[test]
    fn test_foreign_buffer_is_rejected() {
        let stream = StreamId::next();
        let mut request = new_request();
        request.add_buffer(stream, buffer()).unwrap();

        let mut other = new_request();
        other.add_buffer(stream, buffer()).unwrap();
        let foreign = other.take_buffer(stream).unwrap();
        assert!(matches!(
            request.complete_buffer(foreign),
            Err(Error::InvalidArgument(_))
        ));

        let unattached = buffer();
        assert!(request.complete_buffer(unattached).is_err());
    }
}
