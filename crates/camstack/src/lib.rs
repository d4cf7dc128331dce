// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! camstack - a userspace camera stack for Video4Linux2
//!
//! camstack turns a kernel V4L2 media graph into application-facing capture
//! streams. It is organised in three layers, leaves first:
//!
//! - the [`media`] graph model: entities, pads and links as reported by the
//!   kernel media controller topology;
//! - the [`v4l2`] video device: format negotiation over the single-plane,
//!   multi-plane and metadata ioctl variants, buffer export/import and the
//!   queue/dequeue state machine, including the buffer cache that keeps
//!   imported dmabufs bound to stable kernel buffer indices;
//! - the [`pipeline`] handler framework that maps a [`camera::Camera`] and its
//!   [`request::Request`] queue onto per-device operations.
//!
//! # Quick Start
//!
//! ```no_run
//! use camstack::manager::CameraManager;
//! use camstack::media::MediaDeviceList;
//! use camstack::pipeline::PipelineRegistry;
//! use std::time::Duration;
//!
//! let registry = PipelineRegistry::new();
//! // registry.register("my-platform", || Box::new(MyPipeline::new()));
//! let mut manager = CameraManager::new(registry);
//! let mut devices = MediaDeviceList::new();
//! manager.start(&mut devices)?;
//!
//! for camera in manager.cameras() {
//!     println!("camera: {}", camera);
//! }
//!
//! let completed = manager.process_events(Some(Duration::from_millis(100)))?;
//! println!("{} requests completed", completed.len());
//! # Ok::<(), camstack::Error>(())
//! ```
//!
//! # Event Loop
//!
//! Nothing in this crate spawns a thread or blocks on hardware. Devices expose
//! an [`event::EventNotifier`] that is only enabled while buffers are in
//! flight, and the application drives completion with
//! [`manager::CameraManager::process_events`].

use std::{error, fmt, io, num::TryFromIntError};

pub use camstack_sys as sys;

/// Error type for camstack operations
#[derive(Debug)]
pub enum Error {
    /// I/O error from a system call other than an ioctl (open, poll, dup)
    Io(io::Error),

    /// A V4L2 or media controller ioctl failed
    Ioctl {
        request: &'static str,
        source: io::Error,
    },

    /// Integer conversion error (try_from failed)
    TryFromInt(TryFromIntError),

    /// The device lacks a required capability or uses an unsupported buffer type
    UnsupportedDevice(String),

    /// The video device has not been opened
    NotOpen,

    /// Buffers are already allocated on the device
    AlreadyAllocated,

    /// The operation requires buffers to be allocated first
    NotAllocated,

    /// The object is in the wrong state for the requested operation
    InvalidState(String),

    /// An argument was rejected before reaching the kernel
    InvalidArgument(String),

    /// A named or numbered object does not exist
    NotFound(String),

    /// The kernel reported an impossible number of planes for a buffer
    InvalidPlaneCount(u32),

    /// The driver granted fewer buffers than requested
    InsufficientBuffers { requested: u32, allocated: u32 },

    /// A request was completed while some of its buffers were still pending
    BuffersPending(request::RequestId),

    /// A camera operation is not permitted in the camera's current state
    AccessDenied {
        state: camera::CameraState,
        operation: &'static str,
    },

    /// The camera has been disconnected from its pipeline handler
    Disconnected,
}

impl Error {
    /// The errno carried by this error, if it originated from the kernel.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(err) => err.raw_os_error(),
            Error::Ioctl { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Ioctl { request, source } => write!(f, "{} failed: {}", request, source),
            Error::TryFromInt(err) => write!(f, "Integer conversion error: {}", err),
            Error::UnsupportedDevice(msg) => write!(f, "Unsupported device: {}", msg),
            Error::NotOpen => write!(f, "Device is not open"),
            Error::AlreadyAllocated => write!(f, "Buffers already allocated"),
            Error::NotAllocated => write!(f, "No buffers allocated"),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::InvalidPlaneCount(n) => write!(f, "Invalid number of planes ({})", n),
            Error::InsufficientBuffers {
                requested,
                allocated,
            } => write!(
                f,
                "Not enough buffers provided by device ({} requested, {} allocated)",
                requested, allocated
            ),
            Error::BuffersPending(id) => write!(f, "Request {} still has pending buffers", id),
            Error::AccessDenied { state, operation } => {
                write!(f, "Camera in {} state trying {}", state, operation)
            }
            Error::Disconnected => write!(f, "Camera has been disconnected"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Ioctl { source, .. } => Some(source),
            Error::TryFromInt(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<TryFromIntError> for Error {
    fn from(err: TryFromIntError) -> Self {
        Error::TryFromInt(err)
    }
}

/// The fourcc module provides portable handling of fourcc codes.
pub mod fourcc;

/// Sizes and size ranges used by format negotiation.
pub mod geometry;

/// dmabuf-backed frame buffers and their per-capture metadata.
pub mod framebuffer;

/// Readiness notifiers and the poll-based event dispatcher.
pub mod event;

/// The media module models the kernel media controller graph.
pub mod media;

/// The v4l2 module drives V4L2 video device nodes.
pub mod v4l2;

/// Control identifiers and the per-camera control capability map.
pub mod controls;

/// Streams and camera configurations.
pub mod stream;

/// Capture requests.
pub mod request;

/// The pipeline handler contract and its shared framework.
pub mod pipeline;

/// The application-facing camera handle and its state machine.
pub mod camera;

/// The camera manager drives pipeline handler matching and the event loop.
pub mod manager;
