// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 Video Device API
//!
//! This module drives V4L2 video device nodes: capability classification,
//! format negotiation, buffer allocation and the queue/dequeue state machine
//! that moves dmabuf-backed [`FrameBuffer`](crate::framebuffer::FrameBuffer)s
//! through the kernel.
//!
//! # Features
//!
//! - **Classification**: Each opened node is bound to exactly one buffer queue
//!   (video capture/output, single or multi-planar, or metadata)
//! - **Format Negotiation**: `G_FMT`/`S_FMT` through the codec matching the queue
//! - **Format Discovery**: Pixel formats via `VIDIOC_ENUM_FMT` and frame sizes via
//!   `VIDIOC_ENUM_FRAMESIZES`
//! - **Buffer Export**: Device-allocated buffers exported as one dmabuf per plane
//! - **Buffer Import**: Externally allocated dmabufs bound to stable indices by
//!   the [`V4L2BufferCache`]
//! - **Non-blocking Completion**: Readiness notification enabled only while
//!   buffers are in flight, one dequeue per wakeup
//!
//! # Quick Start
//!
//! ```no_run
//! use camstack::event::EventDispatcher;
//! use camstack::v4l2::V4L2VideoDevice;
//! use std::{cell::RefCell, rc::Rc, time::Duration};
//!
//! let mut video = V4L2VideoDevice::new("/dev/video0");
//! video.open()?;
//! println!("{}: {}", video.caps().driver(), video.get_format()?);
//!
//! let done = Rc::new(RefCell::new(Vec::new()));
//! let sink = done.clone();
//! video.set_buffer_listener(Box::new(move |buffer| sink.borrow_mut().push(buffer)));
//!
//! for buffer in video.export_buffers(4)? {
//!     video.queue_buffer(buffer).ok();
//! }
//! video.stream_on()?;
//!
//! while done.borrow().len() < 4 {
//!     let notifiers: Vec<_> = video.notifier().into_iter().collect();
//!     if !EventDispatcher::wait(&notifiers, Some(Duration::from_secs(1)))?.is_empty() {
//!         video.buffer_available()?;
//!     }
//! }
//! video.stream_off()?;
//! # Ok::<(), camstack::Error>(())
//! ```
//!
//! # Buffer Types
//!
//! | Type | Direction | Format codec |
//! |------|-----------|--------------|
//! | [`BufferType::VideoCapture`] | capture | single-plane |
//! | [`BufferType::VideoCaptureMplane`] | capture | multi-plane |
//! | [`BufferType::VideoOutput`] | output | single-plane |
//! | [`BufferType::VideoOutputMplane`] | output | multi-plane |
//! | [`BufferType::MetaCapture`] | capture | meta |
//! | [`BufferType::MetaOutput`] | output | meta |
//!
//! Video capture wins over video output, which wins over metadata, when a node
//! advertises several. Memory-to-memory nodes advertise both directions and are
//! driven through [`V4L2M2MDevice`].
//!
//! # Memory Types
//!
//! | Mode | Allocation | Cache |
//! |------|------------|-------|
//! | [`MemoryType::Mmap`] | `export_buffers` | pre-populated with the exported buffers |
//! | [`MemoryType::DmaBuf`] | `import_buffers` | empty, filled as buffers are queued |
//!
//! # See Also
//!
//! - [`V4L2VideoDevice`] - Main entry point for a single video node
//! - [`V4L2DeviceFormat`] - Negotiated image format
//! - [`ImageFormats`] - Supported formats and sizes

mod cache;
mod device;
mod enumerator;
mod format;
mod ioctl;
mod m2m;
mod pixel_format;
mod video_device;

pub use cache::V4L2BufferCache;
pub use device::{BufferType, Capability, Direction, FormatVariant, MemoryType};
pub use enumerator::ImageFormats;
pub use format::{PlaneFormat, V4L2DeviceFormat, MAX_FORMAT_PLANES};
pub use ioctl::{DeviceNode, Ioctl, IoctlDevice};
pub use m2m::V4L2M2MDevice;
pub use pixel_format::{to_pixel_format, to_v4l2_fourcc, v4l2_fourcc, PixelFormat};
pub use video_device::{BufferListener, QueueError, V4L2VideoDevice};

pub(crate) use ioctl::raw_ioctl;
