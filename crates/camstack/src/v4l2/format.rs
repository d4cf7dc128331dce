// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Device format description and the three `G_FMT`/`S_FMT` codecs.

use crate::{fourcc::FourCC, geometry::Size, v4l2::device::FormatVariant, Error};
use camstack_sys as sys;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of planes carried by a [`V4L2DeviceFormat`]
pub const MAX_FORMAT_PLANES: usize = 3;

/// Stride and total size of one image plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaneFormat {
    /// Bytes per line
    pub bpl: u32,
    /// Total plane size in bytes
    pub size: u32,
}

/// An image format applied to, or read back from, a video device.
///
/// Packed formats use only plane 0. Semi-planar and planar formats use two
/// or three planes. The value returned by
/// [`super::V4L2VideoDevice::set_format`] is authoritative; drivers may adjust
/// any field of the requested format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct V4L2DeviceFormat {
    pub size: Size,
    pub fourcc: FourCC,
    pub planes_count: u8,
    pub planes: [PlaneFormat; MAX_FORMAT_PLANES],
}

impl V4L2DeviceFormat {
    /// Single-plane format with the given stride and image size
    pub fn packed(size: Size, fourcc: FourCC, bpl: u32, image_size: u32) -> Self {
        let mut planes = [PlaneFormat::default(); MAX_FORMAT_PLANES];
        planes[0] = PlaneFormat {
            bpl,
            size: image_size,
        };
        Self {
            size,
            fourcc,
            planes_count: 1,
            planes,
        }
    }

    /// The planes in use
    pub fn planes(&self) -> &[PlaneFormat] {
        let count = (self.planes_count as usize).min(MAX_FORMAT_PLANES);
        &self.planes[..count]
    }
}

impl fmt::Display for V4L2DeviceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.size, self.fourcc)
    }
}

/// Encode `format` into the kernel structure for `variant`.
pub(crate) fn encode(
    variant: FormatVariant,
    buffer_type: u32,
    format: &V4L2DeviceFormat,
) -> Result<sys::v4l2_format, Error> {
    let mut raw = sys::v4l2_format {
        type_: buffer_type,
        ..Default::default()
    };

    match variant {
        FormatVariant::Meta => {
            raw.fmt.meta = sys::v4l2_meta_format {
                dataformat: format.fourcc.as_u32(),
                buffersize: format.planes[0].size,
            };
        }
        FormatVariant::MultiPlane => {
            let count = format.planes_count as usize;
            if count == 0 || count > MAX_FORMAT_PLANES {
                return Err(Error::InvalidArgument(format!(
                    "format carries {} planes",
                    count
                )));
            }
            let mut plane_fmt = [sys::v4l2_plane_pix_format::default(); sys::VIDEO_MAX_PLANES];
            for (dst, plane) in plane_fmt.iter_mut().zip(format.planes()) {
                dst.bytesperline = plane.bpl;
                dst.sizeimage = plane.size;
            }
            raw.fmt.pix_mp = sys::v4l2_pix_format_mplane {
                width: format.size.width,
                height: format.size.height,
                pixelformat: format.fourcc.as_u32(),
                field: sys::V4L2_FIELD_NONE,
                plane_fmt,
                num_planes: format.planes_count,
                ..Default::default()
            };
        }
        FormatVariant::SinglePlane => {
            raw.fmt.pix = sys::v4l2_pix_format {
                width: format.size.width,
                height: format.size.height,
                pixelformat: format.fourcc.as_u32(),
                bytesperline: format.planes[0].bpl,
                field: sys::V4L2_FIELD_NONE,
                ..Default::default()
            };
        }
    }

    Ok(raw)
}

/// Decode the kernel structure for `variant` into a device format.
pub(crate) fn decode(variant: FormatVariant, raw: &sys::v4l2_format) -> Result<V4L2DeviceFormat, Error> {
    let mut format = V4L2DeviceFormat::default();

    match variant {
        FormatVariant::Meta => {
            // SAFETY: the union was filled by G_FMT/S_FMT for a meta buffer type.
            let meta = unsafe { raw.fmt.meta };
            let buffersize = meta.buffersize;
            format.size = Size::new(0, 0);
            format.fourcc = FourCC::from_u32(meta.dataformat);
            format.planes_count = 1;
            format.planes[0] = PlaneFormat {
                bpl: buffersize,
                size: buffersize,
            };
        }
        FormatVariant::MultiPlane => {
            // SAFETY: the union was filled for a multi-planar buffer type.
            let pix = unsafe { raw.fmt.pix_mp };
            let num_planes = pix.num_planes;
            if num_planes as usize > MAX_FORMAT_PLANES {
                return Err(Error::InvalidPlaneCount(num_planes as u32));
            }
            format.size = Size::new(pix.width, pix.height);
            format.fourcc = FourCC::from_u32(pix.pixelformat);
            format.planes_count = num_planes;
            let plane_fmt = pix.plane_fmt;
            for (i, plane) in plane_fmt.iter().take(num_planes as usize).enumerate() {
                format.planes[i] = PlaneFormat {
                    bpl: plane.bytesperline,
                    size: plane.sizeimage,
                };
            }
        }
        FormatVariant::SinglePlane => {
            // SAFETY: the union was filled for a single-planar buffer type.
            let pix = unsafe { raw.fmt.pix };
            format.size = Size::new(pix.width, pix.height);
            format.fourcc = FourCC::from_u32(pix.pixelformat);
            format.planes_count = 1;
            format.planes[0] = PlaneFormat {
                bpl: pix.bytesperline,
                size: pix.sizeimage,
            };
        }
    }

    Ok(format)
}
