// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Memory-to-memory devices: one node, two queues.

use crate::{
    v4l2::{
        device::Direction,
        ioctl::{DeviceNode, IoctlDevice},
        video_device::V4L2VideoDevice,
    },
    Error,
};
use log::error;
use std::path::{Path, PathBuf};

/// A memory-to-memory video node split into its output (source) and
/// capture (destination) queues.
///
/// The node is opened once; each queue gets its own duplicate of the
/// descriptor so both see the same kernel context.
#[derive(Debug)]
pub struct V4L2M2MDevice {
    device_node: PathBuf,
    output: V4L2VideoDevice,
    capture: V4L2VideoDevice,
}

impl V4L2M2MDevice {
    pub fn new(device_node: impl Into<PathBuf>) -> Self {
        let device_node = device_node.into();
        Self {
            output: V4L2VideoDevice::new(&device_node),
            capture: V4L2VideoDevice::new(&device_node),
            device_node,
        }
    }

    /// Open the node and both of its queues.
    pub fn open(&mut self) -> Result<(), Error> {
        let node = DeviceNode::open(&self.device_node).map_err(|err| {
            error!("Failed to open {}: {}", self.device_node.display(), err);
            Error::Io(err)
        })?;
        self.open_with(Box::new(node))
    }

    /// Open both queues on an already open handle to the node.
    pub fn open_with(&mut self, io: Box<dyn IoctlDevice>) -> Result<(), Error> {
        let output_io = io.try_clone()?;
        let capture_io = io.try_clone()?;
        drop(io);

        self.output = V4L2VideoDevice::with_io(&self.device_node, output_io);
        self.output.open_as(Direction::Output)?;

        self.capture = V4L2VideoDevice::with_io(&self.device_node, capture_io);
        if let Err(err) = self.capture.open_as(Direction::Capture) {
            if let Err(close) = self.output.close() {
                error!("Failed to close output queue: {}", close);
            }
            return Err(err);
        }

        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        let capture = self.capture.close();
        let output = self.output.close();
        capture.and(output)
    }

    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    pub fn output(&mut self) -> &mut V4L2VideoDevice {
        &mut self.output
    }

    pub fn capture(&mut self) -> &mut V4L2VideoDevice {
        &mut self.capture
    }
}
