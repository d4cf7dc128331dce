// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Camera Manager
//!
//! The [`CameraManager`] owns every matched pipeline handler and the cameras
//! they registered. It is also the single event loop of the stack:
//! [`CameraManager::process_events`] waits once on all enabled notifiers,
//! lets each handler dequeue its ready buffers and returns the requests that
//! completed.
//!
//! # Handler Selection
//!
//! By default every factory in the [`PipelineRegistry`] is tried in
//! registration order. Setting `CAMSTACK_PIPELINES_MATCH_LIST` to a
//! comma-separated list of handler names restricts matching to those
//! handlers, tried in list order:
//!
//! ```text
//! CAMSTACK_PIPELINES_MATCH_LIST=rkisp1,simple
//! ```

use crate::{
    camera::{Camera, CameraId},
    event::{EventDispatcher, EventNotifier},
    media::DeviceEnumerator,
    pipeline::{PipelineFactory, PipelineHandler, PipelineRegistry},
    request::Request,
    Error,
};
use log::{debug, error, info, warn};
use std::{env, time::Duration};

/// Environment variable restricting which pipeline handlers are matched
pub const PIPELINES_MATCH_LIST: &str = "CAMSTACK_PIPELINES_MATCH_LIST";

#[derive(Debug, Clone)]
struct CameraEntry {
    id: CameraId,
    name: String,
    handler: usize,
}

pub struct CameraManager {
    registry: PipelineRegistry,
    handlers: Vec<Box<dyn PipelineHandler>>,
    cameras: Vec<CameraEntry>,
    running: bool,
}

impl CameraManager {
    pub fn new(registry: PipelineRegistry) -> Self {
        Self {
            registry,
            handlers: Vec::new(),
            cameras: Vec::new(),
            running: false,
        }
    }

    /// Match pipeline handlers against the devices in `enumerator`.
    ///
    /// Each selected factory is invoked repeatedly, one handler instance per
    /// successful match, until its handler no longer matches anything.
    pub fn start(&mut self, enumerator: &mut dyn DeviceEnumerator) -> Result<(), Error> {
        if self.running {
            return Err(Error::InvalidState("camera manager already started".into()));
        }

        for (name, factory) in self.selected_factories() {
            loop {
                let mut handler = factory();
                if !handler.match_devices(enumerator) {
                    break;
                }
                debug!("Pipeline handler \"{}\" matched", name);
                self.add_handler(handler);
            }
        }

        info!(
            "Camera manager started with {} pipeline handlers and {} cameras",
            self.handlers.len(),
            self.cameras.len()
        );
        self.running = true;
        Ok(())
    }

    fn selected_factories(&self) -> Vec<(String, PipelineFactory)> {
        match env::var(PIPELINES_MATCH_LIST) {
            Ok(list) => list
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .filter_map(|name| match self.registry.get(name) {
                    Some(factory) => Some((name.to_owned(), factory)),
                    None => {
                        warn!("Pipeline handler \"{}\" not found", name);
                        None
                    }
                })
                .collect(),
            Err(_) => self
                .registry
                .names()
                .into_iter()
                .filter_map(|name| {
                    self.registry
                        .get(name)
                        .map(|factory| (name.to_owned(), factory))
                })
                .collect(),
        }
    }

    fn add_handler(&mut self, handler: Box<dyn PipelineHandler>) {
        let index = self.handlers.len();
        for data in handler.framework().cameras() {
            if self.cameras.iter().any(|entry| entry.name == data.name()) {
                error!("Registering camera with duplicate name {}", data.name());
            }
            info!("Adding camera {} for pipeline handler {}", data.name(), handler.name());
            self.cameras.push(CameraEntry {
                id: data.id(),
                name: data.name().to_owned(),
                handler: index,
            });
        }
        self.handlers.push(handler);
    }

    /// Stop every running camera and drop all pipeline handlers, releasing
    /// their media devices.
    pub fn stop(&mut self) {
        let entries = std::mem::take(&mut self.cameras);
        for entry in &entries {
            let handler = &mut self.handlers[entry.handler];
            if let Some(mut camera) = Camera::new(handler.as_mut(), entry.id) {
                if camera.state() == crate::camera::CameraState::Running {
                    warn!("Stopping camera {} on manager shutdown", entry.name);
                    if let Err(err) = camera.stop() {
                        error!("Failed to stop camera {}: {}", entry.name, err);
                    }
                }
            }
        }
        self.handlers.clear();
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Names of all cameras, in registration order
    pub fn cameras(&self) -> Vec<String> {
        self.cameras.iter().map(|entry| entry.name.clone()).collect()
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.cameras.iter().map(|entry| entry.id).collect()
    }

    /// A handle to the camera called `name`
    pub fn get(&mut self, name: &str) -> Option<Camera<'_>> {
        let entry = self.cameras.iter().find(|entry| entry.name == name)?;
        Camera::new(self.handlers[entry.handler].as_mut(), entry.id)
    }

    /// A handle to the camera with `id`
    pub fn camera(&mut self, id: CameraId) -> Option<Camera<'_>> {
        let entry = self.cameras.iter().find(|entry| entry.id == id)?;
        Camera::new(self.handlers[entry.handler].as_mut(), entry.id)
    }

    pub fn handlers(&self) -> impl Iterator<Item = &(dyn PipelineHandler + 'static)> + '_ {
        self.handlers.iter().map(Box::as_ref)
    }

    /// Run one iteration of the event loop.
    ///
    /// Waits up to `timeout` for any enabled notifier, dispatches each ready
    /// descriptor to the handler that owns it and returns the requests
    /// completed since the last call. Does not wait at all when completed
    /// requests are already available.
    pub fn process_events(&mut self, timeout: Option<Duration>) -> Result<Vec<Request>, Error> {
        let mut owners: Vec<usize> = Vec::new();
        let mut notifiers: Vec<EventNotifier> = Vec::new();
        for (index, handler) in self.handlers.iter().enumerate() {
            for notifier in handler.event_notifiers() {
                owners.push(index);
                notifiers.push(notifier);
            }
        }

        let timeout = if self.handlers.iter().any(|h| h.framework().has_completed()) {
            Some(Duration::ZERO)
        } else {
            timeout
        };

        let ready = EventDispatcher::wait(&notifiers, timeout)?;
        for fd in ready {
            for (notifier, owner) in notifiers.iter().zip(&owners) {
                if notifier.fd() != fd || !notifier.is_enabled() {
                    continue;
                }
                let handler = &mut self.handlers[*owner];
                if let Err(err) = handler.process_event(fd) {
                    error!("{}: event on fd {} failed: {}", handler.name(), fd, err);
                }
                break;
            }
        }

        let mut completed = Vec::new();
        for handler in &mut self.handlers {
            completed.extend(handler.framework_mut().take_completed());
        }
        Ok(completed)
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        if self.running {
            self.stop();
        }
    }
}
