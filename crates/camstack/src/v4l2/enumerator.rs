// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Pixel format and frame size enumeration
//!
//! [`ImageFormats`] is the capability query consumed by configuration
//! generation and by external adapters: every pixel format a video device
//! queue supports, each with the frame sizes the driver reports for it.

use crate::{
    fourcc::FourCC,
    geometry::{Size, SizeRange},
    v4l2::ioctl::{Ioctl, IoctlDevice},
    Error,
};
use camstack_sys as sys;
use log::{debug, error};
use std::collections::BTreeMap;

/// Supported pixel formats of a device queue with their frame sizes
///
/// # Example
///
/// ```no_run
/// use camstack::v4l2::V4L2VideoDevice;
///
/// let mut video = V4L2VideoDevice::new("/dev/video0");
/// video.open()?;
/// let formats = video.formats()?;
/// for fourcc in formats.fourccs() {
///     for range in formats.sizes(fourcc) {
///         println!("{}: {}", fourcc, range);
///     }
/// }
/// # Ok::<(), camstack::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageFormats {
    formats: BTreeMap<FourCC, Vec<SizeRange>>,
}

impl ImageFormats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `sizes` for `fourcc`. Adding the same format twice is an error.
    pub fn add_format(&mut self, fourcc: FourCC, sizes: Vec<SizeRange>) -> Result<(), Error> {
        if self.formats.contains_key(&fourcc) {
            return Err(Error::InvalidArgument(format!(
                "pixel format {} listed twice",
                fourcc
            )));
        }
        self.formats.insert(fourcc, sizes);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn fourccs(&self) -> Vec<FourCC> {
        self.formats.keys().copied().collect()
    }

    pub fn sizes(&self, fourcc: FourCC) -> &[SizeRange] {
        self.formats.get(&fourcc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `size` is supported for `fourcc` by any of its ranges
    pub fn supports(&self, fourcc: FourCC, size: Size) -> bool {
        self.sizes(fourcc).iter().any(|range| range.contains(size))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FourCC, &Vec<SizeRange>)> {
        self.formats.iter()
    }
}

/// Enumerate every pixel format of `buffer_type` and its frame sizes.
///
/// A pixel format without any usable size, or an enumeration the driver
/// answers inconsistently, yields an empty set.
pub(crate) fn enumerate(io: &dyn IoctlDevice, buffer_type: u32) -> Result<ImageFormats, Error> {
    let mut formats = ImageFormats::new();

    for fourcc in enum_pixel_formats(io, buffer_type)? {
        let sizes = enum_sizes(io, fourcc)?;
        if sizes.is_empty() {
            debug!("No frame sizes for pixel format {}", fourcc);
            return Ok(ImageFormats::new());
        }
        if let Err(err) = formats.add_format(fourcc, sizes) {
            error!("Could not add sizes for pixel format {}: {}", fourcc, err);
            return Ok(ImageFormats::new());
        }
    }

    Ok(formats)
}

fn enum_pixel_formats(io: &dyn IoctlDevice, buffer_type: u32) -> Result<Vec<FourCC>, Error> {
    let mut fourccs = Vec::new();

    for index in 0.. {
        let mut desc = sys::v4l2_fmtdesc {
            index,
            type_: buffer_type,
            ..Default::default()
        };
        match io.ioctl(&mut Ioctl::EnumFmt(&mut desc)) {
            Ok(()) => fourccs.push(FourCC::from_u32(desc.pixelformat)),
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => break,
            Err(err) => {
                error!("Unable to enumerate pixel formats: {}", err);
                return Err(Error::Ioctl {
                    request: "VIDIOC_ENUM_FMT",
                    source: err,
                });
            }
        }
    }

    Ok(fourccs)
}

fn enum_sizes(io: &dyn IoctlDevice, fourcc: FourCC) -> Result<Vec<SizeRange>, Error> {
    let mut sizes = Vec::new();

    for index in 0.. {
        let mut frame_size = sys::v4l2_frmsizeenum {
            index,
            pixel_format: fourcc.as_u32(),
            ..Default::default()
        };
        match io.ioctl(&mut Ioctl::EnumFrameSizes(&mut frame_size)) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EINVAL) => break,
            Err(err) => {
                error!("Unable to enumerate frame sizes: {}", err);
                return Err(Error::Ioctl {
                    request: "VIDIOC_ENUM_FRAMESIZES",
                    source: err,
                });
            }
        }

        if index != 0 && frame_size.type_ != sys::V4L2_FRMSIZE_TYPE_DISCRETE {
            error!("Non-zero index for non discrete type");
            return Ok(Vec::new());
        }

        // SAFETY: the union member read matches the type the driver reported.
        let range = match frame_size.type_ {
            sys::V4L2_FRMSIZE_TYPE_DISCRETE => {
                let d = unsafe { frame_size.size.discrete };
                SizeRange::discrete(Size::new(d.width, d.height))
            }
            sys::V4L2_FRMSIZE_TYPE_CONTINUOUS => {
                let s = unsafe { frame_size.size.stepwise };
                SizeRange::continuous(
                    Size::new(s.min_width, s.min_height),
                    Size::new(s.max_width, s.max_height),
                )
            }
            sys::V4L2_FRMSIZE_TYPE_STEPWISE => {
                let s = unsafe { frame_size.size.stepwise };
                SizeRange::stepwise(
                    Size::new(s.min_width, s.min_height),
                    Size::new(s.max_width, s.max_height),
                    s.step_width,
                    s.step_height,
                )
            }
            other => {
                error!("Unknown VIDIOC_ENUM_FRAMESIZES type {}", other);
                return Ok(Vec::new());
            }
        };
        sizes.push(range);
    }

    Ok(sizes)
}
