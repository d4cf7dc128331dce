// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{geometry::Size, v4l2::PixelFormat};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    ops::{Index, IndexMut},
    sync::atomic::{AtomicU32, Ordering},
};

static NEXT_STREAM_ID: AtomicU32 = AtomicU32::new(1);

/// Identifier of one image stream produced by a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u32);

impl StreamId {
    pub(crate) fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stream{}", self.0)
    }
}

/// Intended use of a stream, guiding configuration generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamRole {
    StillCapture,
    VideoRecording,
    Viewfinder,
    Raw,
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamRole::StillCapture => write!(f, "still-capture"),
            StreamRole::VideoRecording => write!(f, "video-recording"),
            StreamRole::Viewfinder => write!(f, "viewfinder"),
            StreamRole::Raw => write!(f, "raw"),
        }
    }
}

/// Requested or applied parameters of one stream
///
/// The `stream` field is assigned by the pipeline handler when the
/// configuration is applied and is not part of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamConfiguration {
    pub pixel_format: PixelFormat,
    pub size: Size,
    /// Bytes per line of the first plane, filled in on configuration
    #[serde(default)]
    pub stride: u32,
    pub buffer_count: u32,
    #[serde(skip)]
    pub stream: Option<StreamId>,
}

impl StreamConfiguration {
    pub fn new(pixel_format: PixelFormat, size: Size, buffer_count: u32) -> Self {
        Self {
            pixel_format,
            size,
            stride: 0,
            buffer_count,
            stream: None,
        }
    }
}

impl fmt::Display for StreamConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.size, self.pixel_format)
    }
}

/// Result of validating a camera configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationStatus {
    Valid,
    /// The configuration was changed to something the camera supports
    Adjusted,
    Invalid,
}

/// Ordered stream configurations for one camera
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfiguration {
    configs: Vec<StreamConfiguration>,
}

impl CameraConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_configuration(&mut self, config: StreamConfiguration) {
        self.configs.push(config);
    }

    pub fn get(&self, index: usize) -> Option<&StreamConfiguration> {
        self.configs.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut StreamConfiguration> {
        self.configs.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StreamConfiguration> {
        self.configs.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, StreamConfiguration> {
        self.configs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl Index<usize> for CameraConfiguration {
    type Output = StreamConfiguration;

    fn index(&self, index: usize) -> &StreamConfiguration {
        &self.configs[index]
    }
}

impl IndexMut<usize> for CameraConfiguration {
    fn index_mut(&mut self, index: usize) -> &mut StreamConfiguration {
        &mut self.configs[index]
    }
}

impl fmt::Display for CameraConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, config) in self.configs.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "({}) {}", i, config)?;
        }
        Ok(())
    }
}
