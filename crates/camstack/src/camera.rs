// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Application-facing camera handle
//!
//! A [`Camera`] is a short-lived handle borrowed from the
//! [`CameraManager`](crate::manager::CameraManager). Its state lives in the
//! owning pipeline handler's framework, so handles can be dropped and looked
//! up again freely. Every operation is gated by the camera state machine:
//!
//! ```text
//! Available --acquire--> Acquired --configure--> Configured --start--> Running
//!     ^                      |                       |   ^               |
//!     +------release---------+-------release---------+   +-----stop------+
//! ```
//!
//! A disconnected camera refuses every operation except `release` and
//! `free_frame_buffers` with [`Error::Disconnected`]. An operation attempted
//! in the wrong state fails with [`Error::AccessDenied`].

use crate::{
    controls::{ControlInfoMap, ControlList},
    framebuffer::FrameBuffer,
    pipeline::{CameraData, PipelineHandler},
    request::{Request, RequestError},
    stream::{CameraConfiguration, ConfigurationStatus, StreamId, StreamRole},
    Error,
};
use log::{debug, error, info};
use std::{
    collections::BTreeSet,
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_CAMERA_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(u32);

impl CameraId {
    pub(crate) fn next() -> Self {
        CameraId(NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "camera{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CameraState {
    Available,
    Acquired,
    Configured,
    Running,
}

impl fmt::Display for CameraState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CameraState::Available => write!(f, "Available"),
            CameraState::Acquired => write!(f, "Acquired"),
            CameraState::Configured => write!(f, "Configured"),
            CameraState::Running => write!(f, "Running"),
        }
    }
}

pub struct Camera<'a> {
    handler: &'a mut dyn PipelineHandler,
    id: CameraId,
}

impl<'a> Camera<'a> {
    /// Wrap `id`, which must be registered with `handler`.
    pub(crate) fn new(handler: &'a mut dyn PipelineHandler, id: CameraId) -> Option<Self> {
        handler.framework().camera_data(id)?;
        Some(Self { handler, id })
    }

    pub fn id(&self) -> CameraId {
        self.id
    }

    pub fn name(&self) -> &str {
        self.data().map(|data| data.name()).unwrap_or_default()
    }

    pub fn state(&self) -> CameraState {
        self.data()
            .map(|data| data.state())
            .unwrap_or(CameraState::Available)
    }

    pub fn is_disconnected(&self) -> bool {
        self.data().map_or(true, |data| data.is_disconnected())
    }

    /// All streams the camera can produce
    pub fn streams(&self) -> Vec<StreamId> {
        self.data()
            .map(|data| data.streams().to_vec())
            .unwrap_or_default()
    }

    /// The controls requests may carry
    pub fn controls(&self) -> ControlInfoMap {
        self.data()
            .map(|data| data.controls().clone())
            .unwrap_or_default()
    }

    /// The name of the pipeline handler driving this camera
    pub fn pipeline(&self) -> &str {
        self.handler.name()
    }

    /// Requests queued and not yet completed
    pub fn queued_requests(&self) -> usize {
        self.data().map_or(0, |data| data.queued_count())
    }

    fn data(&self) -> Option<&CameraData> {
        self.handler.framework().camera_data(self.id)
    }

    fn data_mut(&mut self) -> Result<&mut CameraData, Error> {
        self.handler
            .framework_mut()
            .camera_data_mut(self.id)
            .ok_or(Error::Disconnected)
    }

    fn set_state(&mut self, state: CameraState) -> Result<(), Error> {
        self.data_mut()?.set_state(state);
        Ok(())
    }

    /// Check that the camera is connected and its state lies within
    /// `low..=high`.
    fn check_access(
        &self,
        low: CameraState,
        high: CameraState,
        allow_disconnected: bool,
        operation: &'static str,
    ) -> Result<(), Error> {
        let data = self.data().ok_or(Error::Disconnected)?;
        if data.is_disconnected() && !allow_disconnected {
            return Err(Error::Disconnected);
        }
        let state = data.state();
        if state < low || state > high {
            debug!(
                "{}: camera in {} state trying {}() requiring state between {} and {}",
                data.name(),
                state,
                operation,
                low,
                high
            );
            return Err(Error::AccessDenied { state, operation });
        }
        Ok(())
    }

    /// Take exclusive ownership of the camera.
    pub fn acquire(&mut self) -> Result<(), Error> {
        self.check_access(
            CameraState::Available,
            CameraState::Available,
            false,
            "acquire",
        )?;
        if !self.handler.lock() {
            info!("{}: pipeline handler in use by another process", self.name());
            return Err(Error::InvalidState(format!(
                "pipeline handler {} is in use",
                self.handler.name()
            )));
        }
        self.set_state(CameraState::Acquired)
    }

    pub fn release(&mut self) -> Result<(), Error> {
        self.check_access(
            CameraState::Available,
            CameraState::Configured,
            true,
            "release",
        )?;
        if self.state() != CameraState::Available {
            self.handler.unlock();
        }
        self.set_state(CameraState::Available)
    }

    /// A default configuration with one entry per role.
    ///
    /// Returns `None` if the camera has fewer streams than `roles` or the
    /// handler cannot satisfy them.
    pub fn generate_configuration(
        &mut self,
        roles: &[StreamRole],
    ) -> Result<Option<CameraConfiguration>, Error> {
        self.check_access(
            CameraState::Available,
            CameraState::Running,
            false,
            "generate_configuration",
        )?;
        if roles.len() > self.streams().len() {
            return Ok(None);
        }
        let config = self.handler.generate_configuration(self.id, roles);
        if let Some(config) = &config {
            debug!("{}: generated configuration {}", self.name(), config);
        }
        Ok(config)
    }

    /// Apply `config`, which must validate without adjustment.
    ///
    /// On success every entry carries the stream it was assigned, and those
    /// streams become the camera's active set.
    pub fn configure(&mut self, config: &mut CameraConfiguration) -> Result<(), Error> {
        self.check_access(
            CameraState::Acquired,
            CameraState::Configured,
            false,
            "configure",
        )?;
        match self.handler.validate(self.id, config) {
            ConfigurationStatus::Valid => {}
            status => {
                error!("{}: can't configure camera with {:?} configuration", self.name(), status);
                return Err(Error::InvalidArgument(format!(
                    "configuration is {:?}",
                    status
                )));
            }
        }

        for stream_config in config.iter_mut() {
            stream_config.stream = None;
        }
        self.handler.configure(self.id, config)?;

        let owned: BTreeSet<StreamId> = self.streams().into_iter().collect();
        let mut active = BTreeSet::new();
        for stream_config in config.iter() {
            match stream_config.stream {
                Some(stream) if owned.contains(&stream) => {
                    active.insert(stream);
                }
                _ => {
                    return Err(Error::InvalidState(format!(
                        "pipeline handler {} left {} without a stream",
                        self.handler.name(),
                        stream_config
                    )))
                }
            }
        }
        info!("{}: configuring streams: {}", self.name(), config);

        let data = self.data_mut()?;
        data.set_active_streams(active);
        data.set_state(CameraState::Configured);
        Ok(())
    }

    /// A new empty request. `cookie` is returned with it on completion.
    pub fn create_request(&self, cookie: u64) -> Result<Request, Error> {
        self.check_access(
            CameraState::Configured,
            CameraState::Running,
            false,
            "create_request",
        )?;
        Ok(Request::new(
            self.id,
            cookie,
            ControlList::with_info(self.controls()),
        ))
    }

    /// Queue `request` for capture.
    ///
    /// The request must carry at least one buffer, and only buffers for
    /// active streams. A refused request is handed back in the error. A
    /// request the hardware accepted only in part is not handed back: it
    /// completes as cancelled once its queued buffers return.
    pub fn queue_request(&mut self, request: Request) -> Result<(), RequestError> {
        if let Err(err) = self.check_access(
            CameraState::Running,
            CameraState::Running,
            false,
            "queue_request",
        ) {
            return Err(RequestError::new(request, err));
        }
        if request.camera() != self.id {
            let err = Error::InvalidArgument(format!(
                "request {} belongs to {}",
                request.id(),
                request.camera()
            ));
            return Err(RequestError::new(request, err));
        }
        let streams = request.streams();
        if streams.is_empty() {
            error!("{}: request {} contains no buffers", self.name(), request.id());
            let err = Error::InvalidArgument("request contains no buffers".into());
            return Err(RequestError::new(request, err));
        }
        let inactive = self.data().and_then(|data| {
            streams
                .iter()
                .find(|stream| !data.active_streams().contains(stream))
                .copied()
        });
        if let Some(stream) = inactive {
            error!("{}: invalid request, {} is not active", self.name(), stream);
            let err = Error::InvalidArgument(format!("{} is not active", stream));
            return Err(RequestError::new(request, err));
        }

        self.handler.queue_request(self.id, request)
    }

    /// Start capture. Active streams without exported buffers are prepared
    /// for imported buffers first.
    pub fn start(&mut self) -> Result<(), Error> {
        self.check_access(
            CameraState::Configured,
            CameraState::Configured,
            false,
            "start",
        )?;
        info!("{}: starting capture", self.name());

        let import: Vec<StreamId> = match self.data() {
            Some(data) => data
                .active_streams()
                .iter()
                .filter(|stream| !data.is_exported(**stream))
                .copied()
                .collect(),
            None => Vec::new(),
        };
        for stream in import {
            self.handler.import_frame_buffers(self.id, stream)?;
        }

        self.handler.start(self.id)?;
        self.set_state(CameraState::Running)
    }

    /// Stop capture. Every queued request is completed, cancelled if it
    /// had not been captured, before this returns.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.check_access(
            CameraState::Running,
            CameraState::Running,
            false,
            "stop",
        )?;
        info!("{}: stopping capture", self.name());

        self.set_state(CameraState::Configured)?;
        self.handler.stop(self.id);

        let imported: Vec<StreamId> = match self.data() {
            Some(data) => data
                .active_streams()
                .iter()
                .filter(|stream| !data.is_exported(**stream))
                .copied()
                .collect(),
            None => Vec::new(),
        };
        for stream in imported {
            self.handler.free_frame_buffers(self.id, stream);
        }
        Ok(())
    }

    /// Allocate buffers for an active stream, owned by the application.
    pub fn export_frame_buffers(&mut self, stream: StreamId) -> Result<Vec<FrameBuffer>, Error> {
        self.check_access(
            CameraState::Configured,
            CameraState::Configured,
            false,
            "export_frame_buffers",
        )?;
        if !self
            .data()
            .is_some_and(|data| data.active_streams().contains(&stream))
        {
            return Err(Error::InvalidArgument(format!("{} is not active", stream)));
        }
        let buffers = self.handler.export_frame_buffers(self.id, stream)?;
        self.data_mut()?.set_exported(stream, true);
        Ok(buffers)
    }

    pub fn free_frame_buffers(&mut self, stream: StreamId) -> Result<(), Error> {
        self.check_access(
            CameraState::Configured,
            CameraState::Configured,
            true,
            "free_frame_buffers",
        )?;
        self.handler.free_frame_buffers(self.id, stream);
        self.data_mut()?.set_exported(stream, false);
        Ok(())
    }
}

impl fmt::Display for Camera<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for Camera<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Camera")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("pipeline", &self.handler.name())
            .field("state", &self.state())
            .finish()
    }
}
