// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! V4L2 device classification
//!
//! This module defines the types used to classify an opened video device:
//!
//! - [`Capability`] - The `VIDIOC_QUERYCAP` result with classification helpers
//! - [`BufferType`] - The single buffer queue a [`super::V4L2VideoDevice`] drives
//! - [`Direction`] - Capture or output, selecting the readiness condition
//! - [`FormatVariant`] - Which of the three format codecs the device uses
//! - [`MemoryType`] - How buffer memory is provided to the queue

use std::fmt;

use crate::Error;
use camstack_sys as sys;

/// Device capabilities as reported by `VIDIOC_QUERYCAP`
#[derive(Debug, Clone, Copy, Default)]
pub struct Capability {
    raw: sys::v4l2_capability,
}

impl Capability {
    pub fn from_raw(raw: sys::v4l2_capability) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &sys::v4l2_capability {
        &self.raw
    }

    pub fn driver(&self) -> String {
        sys::c_str(&self.raw.driver)
    }

    pub fn card(&self) -> String {
        sys::c_str(&self.raw.card)
    }

    pub fn bus_info(&self) -> String {
        sys::c_str(&self.raw.bus_info)
    }

    /// Kernel version the driver was built for, as `(major, minor, patch)`
    pub fn version(&self) -> (u32, u32, u32) {
        let v = self.raw.version;
        ((v >> 16) & 0xff, (v >> 8) & 0xff, v & 0xff)
    }

    /// Capabilities of the opened node, falling back to the physical device
    /// capabilities for drivers that do not report per-node capabilities.
    pub fn device_caps(&self) -> u32 {
        if self.raw.capabilities & sys::V4L2_CAP_DEVICE_CAPS != 0 {
            self.raw.device_caps
        } else {
            self.raw.capabilities
        }
    }

    pub fn is_multiplanar(&self) -> bool {
        self.device_caps()
            & (sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE
                | sys::V4L2_CAP_VIDEO_OUTPUT_MPLANE
                | sys::V4L2_CAP_VIDEO_M2M_MPLANE)
            != 0
    }

    pub fn is_video_capture(&self) -> bool {
        self.device_caps() & (sys::V4L2_CAP_VIDEO_CAPTURE | sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE) != 0
    }

    pub fn is_video_output(&self) -> bool {
        self.device_caps() & (sys::V4L2_CAP_VIDEO_OUTPUT | sys::V4L2_CAP_VIDEO_OUTPUT_MPLANE) != 0
    }

    pub fn is_meta_capture(&self) -> bool {
        self.device_caps() & sys::V4L2_CAP_META_CAPTURE != 0
    }

    pub fn is_meta_output(&self) -> bool {
        self.device_caps() & sys::V4L2_CAP_META_OUTPUT != 0
    }

    pub fn is_m2m(&self) -> bool {
        self.device_caps() & (sys::V4L2_CAP_VIDEO_M2M | sys::V4L2_CAP_VIDEO_M2M_MPLANE) != 0
    }

    pub fn has_streaming(&self) -> bool {
        self.device_caps() & sys::V4L2_CAP_STREAMING != 0
    }
}

/// Direction of a buffer queue
///
/// Capture queues are polled for read readiness (`POLLIN`), output queues
/// for write readiness (`POLLOUT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Capture,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Capture => write!(f, "cap"),
            Direction::Output => write!(f, "out"),
        }
    }
}

/// Format codec selected once when the device is opened
///
/// | Variant | Kernel structure | Planes |
/// |---------|------------------|--------|
/// | [`FormatVariant::SinglePlane`] | `v4l2_pix_format` | 1 |
/// | [`FormatVariant::MultiPlane`] | `v4l2_pix_format_mplane` | 1-3 |
/// | [`FormatVariant::Meta`] | `v4l2_meta_format` | 1 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVariant {
    SinglePlane,
    MultiPlane,
    Meta,
}

/// The buffer queue type a video device instance operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BufferType {
    VideoCapture = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE,
    VideoOutput = sys::V4L2_BUF_TYPE_VIDEO_OUTPUT,
    VideoCaptureMplane = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE,
    VideoOutputMplane = sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE,
    MetaCapture = sys::V4L2_BUF_TYPE_META_CAPTURE,
    MetaOutput = sys::V4L2_BUF_TYPE_META_OUTPUT,
}

impl BufferType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            sys::V4L2_BUF_TYPE_VIDEO_CAPTURE => Some(BufferType::VideoCapture),
            sys::V4L2_BUF_TYPE_VIDEO_OUTPUT => Some(BufferType::VideoOutput),
            sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE => Some(BufferType::VideoCaptureMplane),
            sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE => Some(BufferType::VideoOutputMplane),
            sys::V4L2_BUF_TYPE_META_CAPTURE => Some(BufferType::MetaCapture),
            sys::V4L2_BUF_TYPE_META_OUTPUT => Some(BufferType::MetaOutput),
            _ => None,
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Classify an opened device into exactly one buffer queue type.
    ///
    /// Video capture takes precedence over video output, then metadata
    /// capture and metadata output. Devices without streaming I/O or with
    /// none of these capabilities are rejected.
    pub fn classify(caps: &Capability) -> Result<Self, Error> {
        if !caps.has_streaming() {
            return Err(Error::UnsupportedDevice(
                "device does not support streaming I/O".to_owned(),
            ));
        }

        if caps.is_video_capture() {
            Ok(Self::video(Direction::Capture, caps.is_multiplanar()))
        } else if caps.is_video_output() {
            Ok(Self::video(Direction::Output, caps.is_multiplanar()))
        } else if caps.is_meta_capture() {
            Ok(BufferType::MetaCapture)
        } else if caps.is_meta_output() {
            Ok(BufferType::MetaOutput)
        } else {
            Err(Error::UnsupportedDevice(format!(
                "device is not a supported type (caps {:#010x})",
                caps.device_caps()
            )))
        }
    }

    /// Buffer queue for a forced direction, used by memory-to-memory devices
    /// whose capability set advertises both.
    pub fn for_direction(caps: &Capability, direction: Direction) -> Result<Self, Error> {
        if !caps.has_streaming() {
            return Err(Error::UnsupportedDevice(
                "device does not support streaming I/O".to_owned(),
            ));
        }
        Ok(Self::video(direction, caps.is_multiplanar()))
    }

    fn video(direction: Direction, multiplanar: bool) -> Self {
        match (direction, multiplanar) {
            (Direction::Capture, false) => BufferType::VideoCapture,
            (Direction::Capture, true) => BufferType::VideoCaptureMplane,
            (Direction::Output, false) => BufferType::VideoOutput,
            (Direction::Output, true) => BufferType::VideoOutputMplane,
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            BufferType::VideoCapture | BufferType::VideoCaptureMplane | BufferType::MetaCapture => {
                Direction::Capture
            }
            BufferType::VideoOutput | BufferType::VideoOutputMplane | BufferType::MetaOutput => {
                Direction::Output
            }
        }
    }

    pub fn is_multiplanar(self) -> bool {
        matches!(
            self,
            BufferType::VideoCaptureMplane | BufferType::VideoOutputMplane
        )
    }

    pub fn format_variant(self) -> FormatVariant {
        match self {
            BufferType::VideoCapture | BufferType::VideoOutput => FormatVariant::SinglePlane,
            BufferType::VideoCaptureMplane | BufferType::VideoOutputMplane => {
                FormatVariant::MultiPlane
            }
            BufferType::MetaCapture | BufferType::MetaOutput => FormatVariant::Meta,
        }
    }
}

impl fmt::Display for BufferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BufferType::VideoCapture => "video-capture",
            BufferType::VideoOutput => "video-output",
            BufferType::VideoCaptureMplane => "video-capture-mplane",
            BufferType::VideoOutputMplane => "video-output-mplane",
            BufferType::MetaCapture => "meta-capture",
            BufferType::MetaOutput => "meta-output",
        };
        f.write_str(name)
    }
}

/// V4L2 buffer memory type
///
/// | Mode | Allocation | Used by |
/// |------|------------|---------|
/// | [`MemoryType::Mmap`] | Kernel, exported as dmabuf | `export_buffers` |
/// | [`MemoryType::DmaBuf`] | External dmabuf per queue | `import_buffers` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MemoryType {
    Mmap = sys::V4L2_MEMORY_MMAP,
    DmaBuf = sys::V4L2_MEMORY_DMABUF,
}

impl MemoryType {
    pub fn as_raw(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryType::Mmap => write!(f, "MMAP"),
            MemoryType::DmaBuf => write!(f, "DMABUF"),
        }
    }
}
