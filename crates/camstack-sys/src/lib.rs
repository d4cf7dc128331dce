// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Raw kernel ABI for the V4L2 video device and media controller interfaces.
//!
//! The structures mirror `linux/videodev2.h` and `linux/media.h` field for
//! field on 64-bit Linux. Only the subset used by `camstack` is declared.
//! Request codes are computed from the structure sizes the same way the
//! kernel `_IOR`/`_IOW`/`_IOWR` macros do, and the unit tests below pin both
//! the sizes and the resulting codes.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

use std::mem::size_of;

pub use libc;

/// Request code type accepted by `libc::ioctl` on glibc targets.
pub type IoctlRequest = libc::c_ulong;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// `_IOC(dir, type, nr, size)`:
/// `(dir << 30) | (size << 16) | (type << 8) | nr`
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> IoctlRequest {
    ((dir << IOC_DIRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)) as IoctlRequest
}

pub const fn ior<T>(ty: u8, nr: u8) -> IoctlRequest {
    ioc(IOC_READ, ty, nr, size_of::<T>())
}

pub const fn iow<T>(ty: u8, nr: u8) -> IoctlRequest {
    ioc(IOC_WRITE, ty, nr, size_of::<T>())
}

pub const fn iowr<T>(ty: u8, nr: u8) -> IoctlRequest {
    ioc(IOC_READ | IOC_WRITE, ty, nr, size_of::<T>())
}

// -----------------------------------------------------------------------------
// videodev2.h
// -----------------------------------------------------------------------------

pub const VIDEO_MAX_PLANES: usize = 8;

// Device capabilities (v4l2_capability.capabilities / device_caps)
pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x0000_0002;
pub const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x0000_1000;
pub const V4L2_CAP_VIDEO_OUTPUT_MPLANE: u32 = 0x0000_2000;
pub const V4L2_CAP_VIDEO_M2M_MPLANE: u32 = 0x0000_4000;
pub const V4L2_CAP_VIDEO_M2M: u32 = 0x0000_8000;
pub const V4L2_CAP_META_CAPTURE: u32 = 0x0080_0000;
pub const V4L2_CAP_READWRITE: u32 = 0x0100_0000;
pub const V4L2_CAP_STREAMING: u32 = 0x0400_0000;
pub const V4L2_CAP_META_OUTPUT: u32 = 0x0800_0000;
pub const V4L2_CAP_DEVICE_CAPS: u32 = 0x8000_0000;

// enum v4l2_buf_type
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE: u32 = 1;
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT: u32 = 2;
pub const V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE: u32 = 9;
pub const V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE: u32 = 10;
pub const V4L2_BUF_TYPE_META_CAPTURE: u32 = 13;
pub const V4L2_BUF_TYPE_META_OUTPUT: u32 = 14;

// enum v4l2_memory
pub const V4L2_MEMORY_MMAP: u32 = 1;
pub const V4L2_MEMORY_USERPTR: u32 = 2;
pub const V4L2_MEMORY_OVERLAY: u32 = 3;
pub const V4L2_MEMORY_DMABUF: u32 = 4;

// enum v4l2_field
pub const V4L2_FIELD_ANY: u32 = 0;
pub const V4L2_FIELD_NONE: u32 = 1;

// v4l2_buffer.flags
pub const V4L2_BUF_FLAG_MAPPED: u32 = 0x0000_0001;
pub const V4L2_BUF_FLAG_QUEUED: u32 = 0x0000_0002;
pub const V4L2_BUF_FLAG_DONE: u32 = 0x0000_0004;
pub const V4L2_BUF_FLAG_ERROR: u32 = 0x0000_0040;
pub const V4L2_BUF_FLAG_TIMESTAMP_MONOTONIC: u32 = 0x0000_2000;
pub const V4L2_BUF_FLAG_LAST: u32 = 0x0010_0000;

// v4l2_fmtdesc.flags
pub const V4L2_FMT_FLAG_COMPRESSED: u32 = 0x0001;
pub const V4L2_FMT_FLAG_EMULATED: u32 = 0x0002;

// enum v4l2_frmsizetypes
pub const V4L2_FRMSIZE_TYPE_DISCRETE: u32 = 1;
pub const V4L2_FRMSIZE_TYPE_CONTINUOUS: u32 = 2;
pub const V4L2_FRMSIZE_TYPE_STEPWISE: u32 = 3;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_capability {
    pub driver: [u8; 16],
    pub card: [u8; 32],
    pub bus_info: [u8; 32],
    pub version: u32,
    pub capabilities: u32,
    pub device_caps: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_fmtdesc {
    pub index: u32,
    pub type_: u32,
    pub flags: u32,
    pub description: [u8; 32],
    pub pixelformat: u32,
    pub mbus_code: u32,
    pub reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_frmsize_discrete {
    pub width: u32,
    pub height: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_frmsize_stepwise {
    pub min_width: u32,
    pub max_width: u32,
    pub step_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub step_height: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_frmsize_union {
    pub discrete: v4l2_frmsize_discrete,
    pub stepwise: v4l2_frmsize_stepwise,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_frmsizeenum {
    pub index: u32,
    pub pixel_format: u32,
    pub type_: u32,
    pub size: v4l2_frmsize_union,
    pub reserved: [u32; 2],
}

impl Default for v4l2_frmsizeenum {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this plain-data struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_pix_format {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub bytesperline: u32,
    pub sizeimage: u32,
    pub colorspace: u32,
    pub priv_: u32,
    pub flags: u32,
    pub ycbcr_enc: u32,
    pub quantization: u32,
    pub xfer_func: u32,
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_plane_pix_format {
    pub sizeimage: u32,
    pub bytesperline: u32,
    pub reserved: [u16; 6],
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_pix_format_mplane {
    pub width: u32,
    pub height: u32,
    pub pixelformat: u32,
    pub field: u32,
    pub colorspace: u32,
    pub plane_fmt: [v4l2_plane_pix_format; VIDEO_MAX_PLANES],
    pub num_planes: u8,
    pub flags: u8,
    pub ycbcr_enc: u8,
    pub quantization: u8,
    pub xfer_func: u8,
    pub reserved: [u8; 7],
}

#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_meta_format {
    pub dataformat: u32,
    pub buffersize: u32,
}

/// The `fmt` union of `v4l2_format`. The kernel declares a 200 byte raw
/// member and pointer-carrying variants, so the union is 8-byte aligned.
#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_format_union {
    pub pix: v4l2_pix_format,
    pub pix_mp: v4l2_pix_format_mplane,
    pub meta: v4l2_meta_format,
    pub raw_data: [u8; 200],
    _align: [u64; 25],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_format {
    pub type_: u32,
    pub fmt: v4l2_format_union,
}

impl Default for v4l2_format {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for every union member.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_requestbuffers {
    pub count: u32,
    pub type_: u32,
    pub memory: u32,
    pub capabilities: u32,
    pub flags: u8,
    pub reserved: [u8; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_timecode {
    pub type_: u32,
    pub flags: u32,
    pub frames: u8,
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub userbits: [u8; 4],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_plane_m {
    pub mem_offset: u32,
    pub userptr: libc::c_ulong,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_plane {
    pub bytesused: u32,
    pub length: u32,
    pub m: v4l2_plane_m,
    pub data_offset: u32,
    pub reserved: [u32; 11],
}

impl Default for v4l2_plane {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this plain-data struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union v4l2_buffer_m {
    pub offset: u32,
    pub userptr: libc::c_ulong,
    pub planes: *mut v4l2_plane,
    pub fd: i32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct v4l2_buffer {
    pub index: u32,
    pub type_: u32,
    pub bytesused: u32,
    pub flags: u32,
    pub field: u32,
    pub timestamp: libc::timeval,
    pub timecode: v4l2_timecode,
    pub sequence: u32,
    pub memory: u32,
    pub m: v4l2_buffer_m,
    pub length: u32,
    pub reserved2: u32,
    pub request_fd: i32,
}

impl Default for v4l2_buffer {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern; the planes pointer is null.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct v4l2_exportbuffer {
    pub type_: u32,
    pub index: u32,
    pub plane: u32,
    pub flags: u32,
    pub fd: i32,
    pub reserved: [u32; 11],
}

pub const VIDIOC_QUERYCAP: IoctlRequest = ior::<v4l2_capability>(b'V', 0);
pub const VIDIOC_ENUM_FMT: IoctlRequest = iowr::<v4l2_fmtdesc>(b'V', 2);
pub const VIDIOC_G_FMT: IoctlRequest = iowr::<v4l2_format>(b'V', 4);
pub const VIDIOC_S_FMT: IoctlRequest = iowr::<v4l2_format>(b'V', 5);
pub const VIDIOC_REQBUFS: IoctlRequest = iowr::<v4l2_requestbuffers>(b'V', 8);
pub const VIDIOC_QUERYBUF: IoctlRequest = iowr::<v4l2_buffer>(b'V', 9);
pub const VIDIOC_QBUF: IoctlRequest = iowr::<v4l2_buffer>(b'V', 15);
pub const VIDIOC_EXPBUF: IoctlRequest = iowr::<v4l2_exportbuffer>(b'V', 16);
pub const VIDIOC_DQBUF: IoctlRequest = iowr::<v4l2_buffer>(b'V', 17);
pub const VIDIOC_STREAMON: IoctlRequest = iow::<libc::c_int>(b'V', 18);
pub const VIDIOC_STREAMOFF: IoctlRequest = iow::<libc::c_int>(b'V', 19);
pub const VIDIOC_ENUM_FRAMESIZES: IoctlRequest = iowr::<v4l2_frmsizeenum>(b'V', 74);

// -----------------------------------------------------------------------------
// media.h
// -----------------------------------------------------------------------------

// Entity functions
pub const MEDIA_ENT_F_UNKNOWN: u32 = 0x0000_0000;
pub const MEDIA_ENT_F_IO_V4L: u32 = 0x0001_0001;
pub const MEDIA_ENT_F_V4L2_SUBDEV_UNKNOWN: u32 = 0x0002_0000;
pub const MEDIA_ENT_F_CAM_SENSOR: u32 = 0x0002_0001;
pub const MEDIA_ENT_F_PROC_VIDEO_SCALER: u32 = 0x0000_4005;
pub const MEDIA_ENT_F_VID_IF_BRIDGE: u32 = 0x0000_5002;

// Entity flags
pub const MEDIA_ENT_FL_DEFAULT: u32 = 1 << 0;
pub const MEDIA_ENT_FL_CONNECTOR: u32 = 1 << 1;

// Pad flags
pub const MEDIA_PAD_FL_SINK: u32 = 1 << 0;
pub const MEDIA_PAD_FL_SOURCE: u32 = 1 << 1;
pub const MEDIA_PAD_FL_MUST_CONNECT: u32 = 1 << 2;

// Link flags
pub const MEDIA_LNK_FL_ENABLED: u32 = 1 << 0;
pub const MEDIA_LNK_FL_IMMUTABLE: u32 = 1 << 1;
pub const MEDIA_LNK_FL_DYNAMIC: u32 = 1 << 2;
pub const MEDIA_LNK_FL_LINK_TYPE: u32 = 0xf << 28;
pub const MEDIA_LNK_FL_DATA_LINK: u32 = 0 << 28;
pub const MEDIA_LNK_FL_INTERFACE_LINK: u32 = 1 << 28;
pub const MEDIA_LNK_FL_ANCILLARY_LINK: u32 = 2 << 28;

// Interface types
pub const MEDIA_INTF_T_V4L_VIDEO: u32 = 0x0000_0200;
pub const MEDIA_INTF_T_V4L_VBI: u32 = 0x0000_0201;
pub const MEDIA_INTF_T_V4L_SUBDEV: u32 = 0x0000_0203;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct media_device_info {
    pub driver: [u8; 16],
    pub model: [u8; 32],
    pub serial: [u8; 40],
    pub bus_info: [u8; 32],
    pub media_version: u32,
    pub hw_revision: u32,
    pub driver_version: u32,
    pub reserved: [u32; 31],
}

impl Default for media_device_info {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this plain-data struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct media_v2_topology {
    pub topology_version: u64,
    pub num_entities: u32,
    pub reserved1: u32,
    pub ptr_entities: u64,
    pub num_interfaces: u32,
    pub reserved2: u32,
    pub ptr_interfaces: u64,
    pub num_pads: u32,
    pub reserved3: u32,
    pub ptr_pads: u64,
    pub num_links: u32,
    pub reserved4: u32,
    pub ptr_links: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct media_v2_entity {
    pub id: u32,
    pub name: [u8; 64],
    pub function: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

impl Default for media_v2_entity {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this plain-data struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct media_v2_intf_devnode {
    pub major: u32,
    pub minor: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union media_v2_interface_union {
    pub devnode: media_v2_intf_devnode,
    pub raw: [u32; 16],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct media_v2_interface {
    pub id: u32,
    pub intf_type: u32,
    pub flags: u32,
    pub reserved: [u32; 9],
    pub u: media_v2_interface_union,
}

impl Default for media_v2_interface {
    fn default() -> Self {
        // SAFETY: all-zero is a valid bit pattern for this plain-data struct.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct media_v2_pad {
    pub id: u32,
    pub entity_id: u32,
    pub flags: u32,
    pub index: u32,
    pub reserved: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct media_v2_link {
    pub id: u32,
    pub source_id: u32,
    pub sink_id: u32,
    pub flags: u32,
    pub reserved: [u32; 6],
}

pub const MEDIA_IOC_DEVICE_INFO: IoctlRequest = iowr::<media_device_info>(b'|', 0x00);
pub const MEDIA_IOC_G_TOPOLOGY: IoctlRequest = iowr::<media_v2_topology>(b'|', 0x04);

/// Decode a NUL-padded fixed-size kernel string field.
pub fn c_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

#[cfg(all(test, target_os = "linux", target_pointer_width = "64"))]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of};

    #[test]
    fn test_videodev2_struct_sizes() {
        assert_eq!(size_of::<v4l2_capability>(), 104);
        assert_eq!(size_of::<v4l2_fmtdesc>(), 64);
        assert_eq!(size_of::<v4l2_frmsizeenum>(), 44);
        assert_eq!(size_of::<v4l2_pix_format>(), 48);
        assert_eq!(size_of::<v4l2_plane_pix_format>(), 20);
        assert_eq!(size_of::<v4l2_pix_format_mplane>(), 192);
        assert_eq!(size_of::<v4l2_format>(), 208);
        assert_eq!(align_of::<v4l2_format_union>(), 8);
        assert_eq!(size_of::<v4l2_requestbuffers>(), 20);
        assert_eq!(size_of::<v4l2_timecode>(), 16);
        assert_eq!(size_of::<v4l2_plane>(), 64);
        assert_eq!(size_of::<v4l2_buffer>(), 88);
        assert_eq!(size_of::<v4l2_exportbuffer>(), 64);
    }

    #[test]
    fn test_v4l2_buffer_layout() {
        assert_eq!(offset_of!(v4l2_buffer, timestamp), 24);
        assert_eq!(offset_of!(v4l2_buffer, sequence), 56);
        assert_eq!(offset_of!(v4l2_buffer, memory), 60);
        assert_eq!(offset_of!(v4l2_buffer, m), 64);
        assert_eq!(offset_of!(v4l2_buffer, length), 72);
        assert_eq!(offset_of!(v4l2_buffer, request_fd), 80);
        assert_eq!(offset_of!(v4l2_plane, data_offset), 16);
        assert_eq!(offset_of!(v4l2_format, fmt), 8);
    }

    #[test]
    fn test_media_struct_sizes() {
        assert_eq!(size_of::<media_device_info>(), 256);
        assert_eq!(size_of::<media_v2_topology>(), 72);
        assert_eq!(size_of::<media_v2_entity>(), 96);
        assert_eq!(size_of::<media_v2_interface>(), 112);
        assert_eq!(size_of::<media_v2_pad>(), 32);
        assert_eq!(size_of::<media_v2_link>(), 40);
    }

    #[test]
    fn test_ioctl_codes() {
        assert_eq!(VIDIOC_QUERYCAP, 0x8068_5600);
        assert_eq!(VIDIOC_ENUM_FMT, 0xc040_5602);
        assert_eq!(VIDIOC_G_FMT, 0xc0d0_5604);
        assert_eq!(VIDIOC_S_FMT, 0xc0d0_5605);
        assert_eq!(VIDIOC_REQBUFS, 0xc014_5608);
        assert_eq!(VIDIOC_QUERYBUF, 0xc058_5609);
        assert_eq!(VIDIOC_QBUF, 0xc058_560f);
        assert_eq!(VIDIOC_EXPBUF, 0xc040_5610);
        assert_eq!(VIDIOC_DQBUF, 0xc058_5611);
        assert_eq!(VIDIOC_STREAMON, 0x4004_5612);
        assert_eq!(VIDIOC_STREAMOFF, 0x4004_5613);
        assert_eq!(VIDIOC_ENUM_FRAMESIZES, 0xc02c_564a);
        assert_eq!(MEDIA_IOC_DEVICE_INFO, 0xc100_7c00);
        assert_eq!(MEDIA_IOC_G_TOPOLOGY, 0xc048_7c04);
    }

    #[test]
    fn test_c_str() {
        let mut field = [0u8; 16];
        field[..4].copy_from_slice(b"uvcv");
        assert_eq!(c_str(&field), "uvcv");
        assert_eq!(c_str(b"full"), "full");
    }
}
