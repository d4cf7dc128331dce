// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pipeline Handler Framework
//!
//! A pipeline handler maps the abstract camera model onto one family of
//! hardware: it claims media devices, opens the video nodes it needs and
//! translates requests into buffer queue operations. Concrete handlers
//! implement [`PipelineHandler`] and embed a [`PipelineFramework`], which
//! owns the per-camera state and the request bookkeeping shared by every
//! platform.
//!
//! # Request Flow
//!
//! 1. The application queues a [`Request`] on a running camera.
//! 2. [`PipelineHandler::queue_request`] records it at the back of the
//!    camera's FIFO, then calls the handler's
//!    [`queue_request_device`](PipelineHandler::queue_request_device), which
//!    takes the buffers out and queues them on its video devices.
//! 3. When a device completes a buffer the handler returns it with
//!    [`PipelineFramework::complete_buffer`]. Once that reports the last
//!    buffer, the handler calls [`PipelineFramework::complete_request`].
//! 4. Completed requests leave the FIFO from the front only, so the
//!    application sees them in queueing order through
//!    [`CameraManager::process_events`](crate::manager::CameraManager::process_events).
//!
//! # Registration
//!
//! Handlers are constructed through a [`PipelineRegistry`] populated by the
//! application at startup:
//!
//! ```no_run
//! # use camstack::pipeline::{PipelineHandler, PipelineRegistry};
//! # fn simple() -> Box<dyn PipelineHandler> { unimplemented!() }
//! let mut registry = PipelineRegistry::new();
//! registry.register("simple", simple);
//! assert_eq!(registry.names(), vec!["simple"]);
//! ```

use crate::{
    camera::{CameraId, CameraState},
    controls::ControlInfoMap,
    event::EventNotifier,
    framebuffer::FrameBuffer,
    media::{DeviceEnumerator, DeviceMatch, MediaDevice},
    request::{Request, RequestError, RequestId, RequestStatus},
    stream::{CameraConfiguration, ConfigurationStatus, StreamId, StreamRole},
    Error,
};
use log::{debug, error, info, warn};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    os::fd::RawFd,
    rc::Rc,
};

/// The contract between the camera model and one hardware platform
///
/// Every camera operation names the camera it applies to, since one handler
/// may drive several cameras. Stream identifiers are the ones allocated by
/// [`PipelineFramework::register_camera`].
pub trait PipelineHandler {
    fn name(&self) -> &str;

    fn framework(&self) -> &PipelineFramework;

    fn framework_mut(&mut self) -> &mut PipelineFramework;

    /// Claim the media devices this handler drives and register its cameras.
    ///
    /// Returns false when nothing (more) could be matched. The manager
    /// constructs a fresh handler and calls this again after every success.
    fn match_devices(&mut self, enumerator: &mut dyn DeviceEnumerator) -> bool;

    /// A default configuration for `roles`, one entry per role.
    fn generate_configuration(
        &mut self,
        camera: CameraId,
        roles: &[StreamRole],
    ) -> Option<CameraConfiguration>;

    /// Adjust `config` to something the hardware supports.
    fn validate(&self, camera: CameraId, config: &mut CameraConfiguration) -> ConfigurationStatus;

    /// Apply a validated configuration, assigning a stream to every entry.
    fn configure(&mut self, camera: CameraId, config: &mut CameraConfiguration)
        -> Result<(), Error>;

    /// Allocate buffers for `stream` that the application will own.
    fn export_frame_buffers(
        &mut self,
        camera: CameraId,
        stream: StreamId,
    ) -> Result<Vec<FrameBuffer>, Error>;

    /// Prepare `stream` to accept application-provided buffers.
    fn import_frame_buffers(&mut self, camera: CameraId, stream: StreamId) -> Result<(), Error>;

    fn free_frame_buffers(&mut self, camera: CameraId, stream: StreamId);

    fn start(&mut self, camera: CameraId) -> Result<(), Error>;

    /// Stop capture. Every request still in the camera's FIFO must be
    /// completed before this returns.
    fn stop(&mut self, camera: CameraId);

    /// Submit the buffers of `request` to the hardware.
    ///
    /// The request is already at the back of the camera's FIFO and is
    /// reached through [`PipelineFramework::queued_request_mut`]. A buffer
    /// that could not be queued should be put back with
    /// [`Request::restore_buffer`] before returning the error.
    fn queue_request_device(&mut self, camera: CameraId, request: RequestId)
        -> Result<(), Error>;

    /// Notifiers the event loop should wait on.
    fn event_notifiers(&self) -> Vec<EventNotifier> {
        Vec::new()
    }

    /// Handle readiness of `fd`, one of this handler's notifier descriptors.
    fn process_event(&mut self, fd: RawFd) -> Result<(), Error> {
        let _ = fd;
        Ok(())
    }

    /// Take exclusive ownership of the handler's media devices.
    fn lock(&mut self) -> bool {
        self.framework().lock_media_devices()
    }

    fn unlock(&mut self) {
        self.framework().unlock_media_devices();
    }

    /// Record `request` in the camera's queue and submit it to the hardware.
    ///
    /// When the hardware accepts none of its buffers the request leaves the
    /// queue and is handed back. When some buffers were already queued the
    /// request stays queued as cancelled: its remaining buffers complete as
    /// cancelled and it is delivered once the queued ones come back.
    fn queue_request(&mut self, camera: CameraId, request: Request) -> Result<(), RequestError> {
        if self.framework().camera_data(camera).is_none() {
            let err = Error::NotFound(format!("camera {}", camera));
            return Err(RequestError::new(request, err));
        }
        let id = request.id();
        self.framework_mut().push_request(camera, request);

        let Err(err) = self.queue_request_device(camera, id) else {
            debug!("{}: queued request {}", self.name(), id);
            return Ok(());
        };
        error!("{}: failed to queue request {}: {}", self.name(), id, err);
        match self.framework_mut().abort_request(camera, id) {
            Some(request) => Err(RequestError::new(request, err)),
            None => Ok(()),
        }
    }
}

/// Constructs a fresh, unmatched pipeline handler
pub type PipelineFactory = fn() -> Box<dyn PipelineHandler>;

/// Explicit name to constructor mapping used by the camera manager
#[derive(Default)]
pub struct PipelineRegistry {
    factories: Vec<(String, PipelineFactory)>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any earlier entry.
    pub fn register(&mut self, name: &str, factory: PipelineFactory) -> &mut Self {
        if let Some(entry) = self.factories.iter_mut().find(|(n, _)| n == name) {
            warn!("Replacing pipeline handler factory {}", name);
            entry.1 = factory;
        } else {
            self.factories.push((name.to_owned(), factory));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<PipelineFactory> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| *factory)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PipelineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// State the framework keeps for one registered camera
#[derive(Debug)]
pub struct CameraData {
    id: CameraId,
    name: String,
    streams: Vec<StreamId>,
    controls: ControlInfoMap,
    state: CameraState,
    disconnected: bool,
    active: BTreeSet<StreamId>,
    exported: BTreeSet<StreamId>,
    queued: VecDeque<Request>,
}

impl CameraData {
    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn streams(&self) -> &[StreamId] {
        &self.streams
    }

    pub fn controls(&self) -> &ControlInfoMap {
        &self.controls
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Streams selected by the last applied configuration
    pub fn active_streams(&self) -> &BTreeSet<StreamId> {
        &self.active
    }

    pub fn is_exported(&self, stream: StreamId) -> bool {
        self.exported.contains(&stream)
    }

    /// Requests queued and not yet completed, oldest first
    pub fn queued_requests(&self) -> impl Iterator<Item = &Request> {
        self.queued.iter()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    pub(crate) fn set_state(&mut self, state: CameraState) {
        debug!("{}: {} -> {}", self.name, self.state, state);
        self.state = state;
    }

    pub(crate) fn set_active_streams(&mut self, streams: BTreeSet<StreamId>) {
        self.active = streams;
    }

    pub(crate) fn set_exported(&mut self, stream: StreamId, exported: bool) {
        if exported {
            self.exported.insert(stream);
        } else {
            self.exported.remove(&stream);
        }
    }
}

/// Shared plumbing embedded by every pipeline handler
#[derive(Debug, Default)]
pub struct PipelineFramework {
    cameras: BTreeMap<CameraId, CameraData>,
    media_devices: Vec<Rc<MediaDevice>>,
    completed: VecDeque<Request>,
}

impl PipelineFramework {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera exposing `stream_count` streams.
    pub fn register_camera(
        &mut self,
        name: &str,
        stream_count: usize,
        controls: ControlInfoMap,
    ) -> CameraId {
        if self.cameras.values().any(|data| data.name == name) {
            warn!("Registering camera with duplicate name {}", name);
        }
        let id = CameraId::next();
        let streams = (0..stream_count).map(|_| StreamId::next()).collect();
        info!("Registered camera {} ({}) with {} streams", name, id, stream_count);
        self.cameras.insert(
            id,
            CameraData {
                id,
                name: name.to_owned(),
                streams,
                controls,
                state: CameraState::Available,
                disconnected: false,
                active: BTreeSet::new(),
                exported: BTreeSet::new(),
                queued: VecDeque::new(),
            },
        );
        id
    }

    /// Remove a stopped camera and its state.
    pub fn unregister_camera(&mut self, camera: CameraId) -> Result<(), Error> {
        let data = self.data(camera)?;
        if data.state == CameraState::Running {
            return Err(Error::InvalidState(format!(
                "camera {} must be stopped before unregistering",
                data.name
            )));
        }
        if let Some(data) = self.cameras.remove(&camera) {
            info!("Unregistered camera {}", data.name);
        }
        Ok(())
    }

    pub fn camera_data(&self, camera: CameraId) -> Option<&CameraData> {
        self.cameras.get(&camera)
    }

    pub(crate) fn camera_data_mut(&mut self, camera: CameraId) -> Option<&mut CameraData> {
        self.cameras.get_mut(&camera)
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraData> {
        self.cameras.values()
    }

    /// The camera owning `stream`
    pub fn stream_camera(&self, stream: StreamId) -> Option<CameraId> {
        self.cameras
            .values()
            .find(|data| data.streams.contains(&stream))
            .map(|data| data.id)
    }

    fn data(&self, camera: CameraId) -> Result<&CameraData, Error> {
        self.cameras
            .get(&camera)
            .ok_or_else(|| Error::NotFound(format!("camera {}", camera)))
    }

    fn data_mut(&mut self, camera: CameraId) -> Result<&mut CameraData, Error> {
        self.cameras
            .get_mut(&camera)
            .ok_or_else(|| Error::NotFound(format!("camera {}", camera)))
    }

    fn push_request(&mut self, camera: CameraId, request: Request) {
        match self.cameras.get_mut(&camera) {
            Some(data) => data.queued.push_back(request),
            None => error!("Dropping request {} for unknown camera {}", request.id(), camera),
        }
    }

    /// Return `buffer` to the queued request it is attached to.
    ///
    /// Returns true when the request has no more pending buffers.
    pub fn complete_buffer(&mut self, camera: CameraId, buffer: FrameBuffer) -> Result<bool, Error> {
        let id = buffer
            .request()
            .ok_or_else(|| Error::InvalidArgument("buffer is not attached to a request".into()))?;
        let request = self
            .data_mut(camera)?
            .queued
            .iter_mut()
            .find(|request| request.id() == id)
            .ok_or_else(|| Error::NotFound(format!("request {}", id)))?;
        request.complete_buffer(buffer)
    }

    pub fn queued_request(&self, camera: CameraId, request: RequestId) -> Option<&Request> {
        self.cameras
            .get(&camera)?
            .queued
            .iter()
            .find(|r| r.id() == request)
    }

    /// A queued request, for handlers taking out its buffers or filling in
    /// its metadata
    pub fn queued_request_mut(&mut self, camera: CameraId, request: RequestId) -> Option<&mut Request> {
        self.cameras
            .get_mut(&camera)?
            .queued
            .iter_mut()
            .find(|r| r.id() == request)
    }

    /// Mark `request` complete and deliver every finished request at the
    /// front of the camera's queue.
    ///
    /// Fails with [`Error::BuffersPending`] if any buffer of the request has
    /// not been completed.
    pub fn complete_request(&mut self, camera: CameraId, request: RequestId) -> Result<(), Error> {
        let data = self.cameras.get_mut(&camera).ok_or_else(|| {
            Error::NotFound(format!("camera {}", camera))
        })?;
        let entry = data
            .queued
            .iter_mut()
            .find(|r| r.id() == request)
            .ok_or_else(|| Error::NotFound(format!("request {}", request)))?;
        if entry.has_pending_buffers() {
            return Err(Error::BuffersPending(request));
        }
        entry.complete();

        while data
            .queued
            .front()
            .is_some_and(|front| front.status() != RequestStatus::Pending)
        {
            if let Some(done) = data.queued.pop_front() {
                debug!("{}: completed {}", data.name, done);
                self.completed.push_back(done);
            }
        }
        Ok(())
    }

    /// Undo a request whose submission failed.
    ///
    /// A request with no buffer left on the hardware is removed from the
    /// queue and returned. Otherwise the buffers it still holds are
    /// completed as cancelled and the request waits in the queue for the
    /// others.
    fn abort_request(&mut self, camera: CameraId, id: RequestId) -> Option<Request> {
        let data = self.cameras.get_mut(&camera)?;
        let position = data.queued.iter().position(|r| r.id() == id)?;
        if data.queued[position].status() != RequestStatus::Pending {
            return None;
        }
        if !data.queued[position].has_buffers_in_flight() {
            return data.queued.remove(position);
        }

        data.queued[position].cancel_held();
        warn!("{}: request {} partially queued, cancelling", data.name, id);
        None
    }

    /// Drain requests completed since the last call, in completion order.
    pub fn take_completed(&mut self) -> Vec<Request> {
        self.completed.drain(..).collect()
    }

    pub fn has_completed(&self) -> bool {
        !self.completed.is_empty()
    }

    /// Search `enumerator` for a device matching `dm` and claim it.
    ///
    /// Claimed devices are unlocked and released when the framework is
    /// dropped.
    pub fn acquire_media_device(
        &mut self,
        enumerator: &mut dyn DeviceEnumerator,
        dm: &DeviceMatch,
    ) -> Option<Rc<MediaDevice>> {
        let media = enumerator.search(dm)?;
        if !media.acquire() {
            return None;
        }
        self.media_devices.push(media.clone());
        Some(media)
    }

    pub fn media_devices(&self) -> &[Rc<MediaDevice>] {
        &self.media_devices
    }

    /// Lock every claimed media device, or none of them.
    pub fn lock_media_devices(&self) -> bool {
        for (i, media) in self.media_devices.iter().enumerate() {
            if !media.lock() {
                for locked in &self.media_devices[..i] {
                    locked.unlock();
                }
                return false;
            }
        }
        true
    }

    pub fn unlock_media_devices(&self) {
        for media in &self.media_devices {
            media.unlock();
        }
    }

    /// Mark every camera disconnected after its hardware went away.
    ///
    /// Running cameras drop back to Configured so the application can free
    /// their resources and release them.
    pub fn disconnect(&mut self) {
        for data in self.cameras.values_mut() {
            if data.state == CameraState::Running {
                data.set_state(CameraState::Configured);
            }
            data.disconnected = true;
            warn!("Camera {} disconnected", data.name);
        }
    }
}

impl Drop for PipelineFramework {
    fn drop(&mut self) {
        for media in self.media_devices.drain(..) {
            media.unlock();
            media.release();
        }
    }
}
