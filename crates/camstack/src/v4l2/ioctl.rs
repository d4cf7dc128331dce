// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Typed V4L2 ioctls and the device handle they are issued on.
//!
//! [`IoctlDevice`] is the seam between [`super::V4L2VideoDevice`] and the
//! kernel. [`DeviceNode`] forwards every [`Ioctl`] to `libc::ioctl`; other
//! implementations may interpret the same kernel structures in-process.

use camstack_sys::{self as sys, IoctlRequest};
use std::{
    ffi::c_void,
    fs::{File, OpenOptions},
    io,
    os::{
        fd::{AsRawFd, OwnedFd, RawFd},
        unix::fs::OpenOptionsExt,
    },
    path::{Path, PathBuf},
};

/// One V4L2 ioctl together with the kernel structure it operates on
pub enum Ioctl<'a> {
    QueryCap(&'a mut sys::v4l2_capability),
    EnumFmt(&'a mut sys::v4l2_fmtdesc),
    EnumFrameSizes(&'a mut sys::v4l2_frmsizeenum),
    GetFormat(&'a mut sys::v4l2_format),
    SetFormat(&'a mut sys::v4l2_format),
    RequestBuffers(&'a mut sys::v4l2_requestbuffers),
    QueryBuffer(&'a mut sys::v4l2_buffer),
    ExportBuffer(&'a mut sys::v4l2_exportbuffer),
    QueueBuffer(&'a mut sys::v4l2_buffer),
    DequeueBuffer(&'a mut sys::v4l2_buffer),
    /// Argument is the buffer type
    StreamOn(&'a mut libc::c_int),
    /// Argument is the buffer type
    StreamOff(&'a mut libc::c_int),
}

impl Ioctl<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Ioctl::QueryCap(_) => "VIDIOC_QUERYCAP",
            Ioctl::EnumFmt(_) => "VIDIOC_ENUM_FMT",
            Ioctl::EnumFrameSizes(_) => "VIDIOC_ENUM_FRAMESIZES",
            Ioctl::GetFormat(_) => "VIDIOC_G_FMT",
            Ioctl::SetFormat(_) => "VIDIOC_S_FMT",
            Ioctl::RequestBuffers(_) => "VIDIOC_REQBUFS",
            Ioctl::QueryBuffer(_) => "VIDIOC_QUERYBUF",
            Ioctl::ExportBuffer(_) => "VIDIOC_EXPBUF",
            Ioctl::QueueBuffer(_) => "VIDIOC_QBUF",
            Ioctl::DequeueBuffer(_) => "VIDIOC_DQBUF",
            Ioctl::StreamOn(_) => "VIDIOC_STREAMON",
            Ioctl::StreamOff(_) => "VIDIOC_STREAMOFF",
        }
    }

    pub fn request(&self) -> IoctlRequest {
        match self {
            Ioctl::QueryCap(_) => sys::VIDIOC_QUERYCAP,
            Ioctl::EnumFmt(_) => sys::VIDIOC_ENUM_FMT,
            Ioctl::EnumFrameSizes(_) => sys::VIDIOC_ENUM_FRAMESIZES,
            Ioctl::GetFormat(_) => sys::VIDIOC_G_FMT,
            Ioctl::SetFormat(_) => sys::VIDIOC_S_FMT,
            Ioctl::RequestBuffers(_) => sys::VIDIOC_REQBUFS,
            Ioctl::QueryBuffer(_) => sys::VIDIOC_QUERYBUF,
            Ioctl::ExportBuffer(_) => sys::VIDIOC_EXPBUF,
            Ioctl::QueueBuffer(_) => sys::VIDIOC_QBUF,
            Ioctl::DequeueBuffer(_) => sys::VIDIOC_DQBUF,
            Ioctl::StreamOn(_) => sys::VIDIOC_STREAMON,
            Ioctl::StreamOff(_) => sys::VIDIOC_STREAMOFF,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        match self {
            Ioctl::QueryCap(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::EnumFmt(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::EnumFrameSizes(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::GetFormat(arg) | Ioctl::SetFormat(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::RequestBuffers(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::QueryBuffer(arg) | Ioctl::QueueBuffer(arg) | Ioctl::DequeueBuffer(arg) => {
                (&mut **arg) as *mut _ as *mut c_void
            }
            Ioctl::ExportBuffer(arg) => (&mut **arg) as *mut _ as *mut c_void,
            Ioctl::StreamOn(arg) | Ioctl::StreamOff(arg) => (&mut **arg) as *mut _ as *mut c_void,
        }
    }
}

/// A handle V4L2 ioctls can be issued on
pub trait IoctlDevice {
    /// Descriptor polled for buffer completion
    fn raw_fd(&self) -> RawFd;

    /// Issue `cmd`, updating its kernel structure in place.
    fn ioctl(&self, cmd: &mut Ioctl<'_>) -> io::Result<()>;

    /// A second handle on the same open device, sharing its queues.
    fn try_clone(&self) -> io::Result<Box<dyn IoctlDevice>>;
}

/// Issue a raw ioctl, retrying on `EINTR`.
///
/// # Safety
///
/// `arg` must point to a structure of the size and layout encoded in
/// `request`, and any user pointers it carries must be valid for the kernel
/// to read or write for the duration of the call.
pub(crate) unsafe fn raw_ioctl(fd: RawFd, request: IoctlRequest, arg: *mut c_void) -> io::Result<()> {
    loop {
        // SAFETY: upheld by the caller.
        let ret = unsafe { libc::ioctl(fd, request as _, arg) };
        if ret != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// A kernel V4L2 device node opened `O_RDWR | O_NONBLOCK`
#[derive(Debug)]
pub struct DeviceNode {
    path: PathBuf,
    file: File,
}

impl DeviceNode {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn from_fd(fd: OwnedFd, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: File::from(fd),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IoctlDevice for DeviceNode {
    fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn ioctl(&self, cmd: &mut Ioctl<'_>) -> io::Result<()> {
        let request = cmd.request();
        // SAFETY: every Ioctl variant pairs a request code with the kernel
        // structure it was computed from. Plane arrays referenced by
        // v4l2_buffer are owned by the caller and outlive this call.
        unsafe { raw_ioctl(self.file.as_raw_fd(), request, cmd.as_mut_ptr()) }
    }

    fn try_clone(&self) -> io::Result<Box<dyn IoctlDevice>> {
        Ok(Box::new(DeviceNode {
            path: self.path.clone(),
            file: self.file.try_clone()?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioctl_names_and_requests() {
        let mut caps = sys::v4l2_capability::default();
        let cmd = Ioctl::QueryCap(&mut caps);
        assert_eq!(cmd.name(), "VIDIOC_QUERYCAP");
        assert_eq!(cmd.request(), sys::VIDIOC_QUERYCAP);

        let mut buf_type: libc::c_int = sys::V4L2_BUF_TYPE_VIDEO_CAPTURE as libc::c_int;
        let cmd = Ioctl::StreamOff(&mut buf_type);
        assert_eq!(cmd.request(), sys::VIDIOC_STREAMOFF);
    }

    #[test]
    fn test_device_node_rejects_non_v4l2_file() {
        let node = DeviceNode::open("/dev/null").unwrap();
        let mut caps = sys::v4l2_capability::default();
        let err = node.ioctl(&mut Ioctl::QueryCap(&mut caps)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
    }

    #[test]
    fn test_device_node_open_missing() {
        assert!(DeviceNode::open("/dev/does-not-exist-video99").is_err());
    }
}
