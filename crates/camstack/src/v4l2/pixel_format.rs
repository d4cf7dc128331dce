// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Application pixel formats and their V4L2 counterparts.
//!
//! [`PixelFormat`] values are DRM fourccs, the format namespace exposed to
//! applications. Video devices speak V4L2 fourccs, which differ for RGB
//! formats (V4L2 names bytes in memory order, DRM in little-endian word
//! order) and have separate codes for non-contiguous planes.

use crate::fourcc::FourCC;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DRM fourcc pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PixelFormat(pub FourCC);

impl PixelFormat {
    pub const BGR888: PixelFormat = PixelFormat(FourCC::new(b"BG24"));
    pub const RGB888: PixelFormat = PixelFormat(FourCC::new(b"RG24"));
    pub const BGRA8888: PixelFormat = PixelFormat(FourCC::new(b"BA24"));
    pub const YUYV: PixelFormat = PixelFormat(FourCC::new(b"YUYV"));
    pub const YVYU: PixelFormat = PixelFormat(FourCC::new(b"YVYU"));
    pub const UYVY: PixelFormat = PixelFormat(FourCC::new(b"UYVY"));
    pub const VYUY: PixelFormat = PixelFormat(FourCC::new(b"VYUY"));
    pub const NV12: PixelFormat = PixelFormat(FourCC::new(b"NV12"));
    pub const NV21: PixelFormat = PixelFormat(FourCC::new(b"NV21"));
    pub const NV16: PixelFormat = PixelFormat(FourCC::new(b"NV16"));
    pub const NV61: PixelFormat = PixelFormat(FourCC::new(b"NV61"));
    pub const MJPEG: PixelFormat = PixelFormat(FourCC::new(b"MJPG"));

    pub fn fourcc(&self) -> FourCC {
        self.0
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// V4L2 pixel format codes handled by the mapping below.
pub mod v4l2_fourcc {
    use crate::fourcc::FourCC;

    pub const RGB24: FourCC = FourCC::new(b"RGB3");
    pub const BGR24: FourCC = FourCC::new(b"BGR3");
    pub const ARGB32: FourCC = FourCC::new(b"BA24");
    pub const YUYV: FourCC = FourCC::new(b"YUYV");
    pub const YVYU: FourCC = FourCC::new(b"YVYU");
    pub const UYVY: FourCC = FourCC::new(b"UYVY");
    pub const VYUY: FourCC = FourCC::new(b"VYUY");
    pub const NV12: FourCC = FourCC::new(b"NV12");
    pub const NV12M: FourCC = FourCC::new(b"NM12");
    pub const NV21: FourCC = FourCC::new(b"NV21");
    pub const NV21M: FourCC = FourCC::new(b"NM21");
    pub const NV16: FourCC = FourCC::new(b"NV16");
    pub const NV16M: FourCC = FourCC::new(b"NM16");
    pub const NV61: FourCC = FourCC::new(b"NV61");
    pub const NV61M: FourCC = FourCC::new(b"NM61");
    pub const MJPEG: FourCC = FourCC::new(b"MJPG");
    pub const GREY: FourCC = FourCC::new(b"GREY");
}

/// Map a V4L2 fourcc to the application pixel format.
///
/// Contiguous and non-contiguous variants of a planar format map to the same
/// pixel format.
pub fn to_pixel_format(fourcc: FourCC) -> Option<PixelFormat> {
    use v4l2_fourcc as v;

    let format = match fourcc {
        v::RGB24 => PixelFormat::BGR888,
        v::BGR24 => PixelFormat::RGB888,
        v::ARGB32 => PixelFormat::BGRA8888,

        v::YUYV => PixelFormat::YUYV,
        v::YVYU => PixelFormat::YVYU,
        v::UYVY => PixelFormat::UYVY,
        v::VYUY => PixelFormat::VYUY,

        v::NV16 | v::NV16M => PixelFormat::NV16,
        v::NV61 | v::NV61M => PixelFormat::NV61,
        v::NV12 | v::NV12M => PixelFormat::NV12,
        v::NV21 | v::NV21M => PixelFormat::NV21,

        v::MJPEG => PixelFormat::MJPEG,

        _ => {
            error!("Unsupported V4L2 pixel format {} ({:#010x})", fourcc, fourcc.as_u32());
            return None;
        }
    };
    Some(format)
}

/// Map an application pixel format to the V4L2 fourcc to program.
///
/// Planar formats always select the contiguous-plane V4L2 code, which both
/// the single-planar and the multi-planar API accept.
// TODO: select the NxxM codes for multiplanar devices once buffer export
// allocates one dmabuf per plane for them.
pub fn to_v4l2_fourcc(format: PixelFormat, _multiplanar: bool) -> Option<FourCC> {
    use v4l2_fourcc as v;

    let fourcc = match format {
        PixelFormat::BGR888 => v::RGB24,
        PixelFormat::RGB888 => v::BGR24,
        PixelFormat::BGRA8888 => v::ARGB32,

        PixelFormat::YUYV => v::YUYV,
        PixelFormat::YVYU => v::YVYU,
        PixelFormat::UYVY => v::UYVY,
        PixelFormat::VYUY => v::VYUY,

        PixelFormat::NV16 => v::NV16,
        PixelFormat::NV61 => v::NV61,
        PixelFormat::NV12 => v::NV12,
        PixelFormat::NV21 => v::NV21,

        PixelFormat::MJPEG => v::MJPEG,

        _ => {
            error!("Unsupported pixel format {}", format);
            return None;
        }
    };
    Some(fourcc)
}
