// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// In-process virtual V4L2 device shared by the integration tests.
//
// VirtualDevice implements IoctlDevice by interpreting the same kernel
// structures a real driver receives. Buffers live in per-queue state keyed
// by buffer type, so the two queues of a memory-to-memory node can share
// one device through try_clone. Exported dmabufs and the pollable
// descriptor are backed by /dev/null, which is always ready.

#![allow(dead_code)]

use camstack::sys;
use camstack::v4l2::{Ioctl, IoctlDevice};
use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    fs::File,
    io,
    os::fd::{AsRawFd, IntoRawFd, RawFd},
    rc::Rc,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fourcc(code: &[u8; 4]) -> u32 {
    u32::from_le_bytes(*code)
}

/// Static description of the virtual hardware
#[derive(Debug, Clone)]
pub struct VirtualConfig {
    pub driver: &'static str,
    pub card: &'static str,
    pub device_caps: u32,
    /// Enumerated formats with their discrete frame sizes
    pub formats: Vec<(u32, Vec<(u32, u32)>)>,
    /// Upper bound on buffers granted by REQBUFS
    pub max_buffers: u32,
    /// Planes reported by QUERYBUF on multi-planar queues
    pub planes: u32,
    pub plane_length: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl VirtualConfig {
    pub fn capture() -> Self {
        Self {
            driver: "vivid",
            card: "Virtual Capture",
            device_caps: sys::V4L2_CAP_VIDEO_CAPTURE | sys::V4L2_CAP_STREAMING,
            formats: vec![
                (fourcc(b"YUYV"), vec![(640, 480), (1280, 720)]),
                (fourcc(b"MJPG"), vec![(1920, 1080)]),
            ],
            max_buffers: 8,
            planes: 1,
            plane_length: 640 * 480 * 2,
            max_width: 1920,
            max_height: 1080,
        }
    }

    pub fn capture_mplane(planes: u32) -> Self {
        Self {
            card: "Virtual Capture MPlane",
            device_caps: sys::V4L2_CAP_VIDEO_CAPTURE_MPLANE | sys::V4L2_CAP_STREAMING,
            formats: vec![(fourcc(b"NM12"), vec![(640, 480)])],
            planes,
            plane_length: 640 * 480,
            ..Self::capture()
        }
    }

    pub fn output() -> Self {
        Self {
            card: "Virtual Output",
            device_caps: sys::V4L2_CAP_VIDEO_OUTPUT | sys::V4L2_CAP_STREAMING,
            ..Self::capture()
        }
    }

    pub fn meta_capture() -> Self {
        Self {
            card: "Virtual Stats",
            device_caps: sys::V4L2_CAP_META_CAPTURE | sys::V4L2_CAP_STREAMING,
            formats: vec![(fourcc(b"RK1S"), Vec::new())],
            plane_length: 4096,
            ..Self::capture()
        }
    }

    pub fn m2m() -> Self {
        Self {
            card: "Virtual M2M",
            device_caps: sys::V4L2_CAP_VIDEO_M2M_MPLANE | sys::V4L2_CAP_STREAMING,
            planes: 1,
            ..Self::capture()
        }
    }
}

/// A buffer handed to the virtual driver by QBUF
#[derive(Debug, Clone, Default)]
pub struct QueuedBuffer {
    pub index: u32,
    pub fds: Vec<RawFd>,
    pub bytesused: Vec<u32>,
    pub sequence: u32,
    pub timestamp: (i64, i64),
    pub error: bool,
}

#[derive(Default)]
pub struct Queue {
    pub count: u32,
    pub memory: u32,
    pub format: Option<sys::v4l2_format>,
    pub queued: VecDeque<QueuedBuffer>,
    pub done: VecDeque<QueuedBuffer>,
    pub streaming: bool,
    pub sequence: u32,
}

#[derive(Default)]
pub struct VirtualState {
    pub queues: HashMap<u32, Queue>,
    /// Names of every ioctl received, in order
    pub calls: Vec<&'static str>,
    /// Buffer index at which EXPBUF fails with EINVAL
    pub fail_export_at: Option<u32>,
    /// Fail the next ioctl with this name and errno
    pub fail_next: Option<(&'static str, i32)>,
    pub exported: u32,
}

#[derive(Clone)]
pub struct VirtualDevice {
    config: Rc<VirtualConfig>,
    state: Rc<RefCell<VirtualState>>,
    file: Rc<File>,
}

impl VirtualDevice {
    pub fn new(config: VirtualConfig) -> Self {
        Self {
            config: Rc::new(config),
            state: Rc::new(RefCell::new(VirtualState::default())),
            file: Rc::new(File::open("/dev/null").expect("open /dev/null")),
        }
    }

    pub fn boxed(&self) -> Box<dyn IoctlDevice> {
        Box::new(self.clone())
    }

    pub fn state(&self) -> std::cell::RefMut<'_, VirtualState> {
        self.state.borrow_mut()
    }

    pub fn queue<R>(&self, buffer_type: u32, f: impl FnOnce(&mut Queue) -> R) -> R {
        f(self.state().queues.entry(buffer_type).or_default())
    }

    /// Complete the oldest queued buffer of `buffer_type`. Capture buffers
    /// report every plane full.
    pub fn complete(&self, buffer_type: u32, error: bool) -> bool {
        let plane_length = self.config.plane_length;
        self.queue(buffer_type, |queue| {
            let Some(mut buffer) = queue.queued.pop_front() else {
                return false;
            };
            if is_capture(buffer_type) {
                queue.sequence += 1;
                buffer.sequence = queue.sequence;
                buffer.timestamp = (queue.sequence as i64, 500);
                for bytesused in buffer.bytesused.iter_mut() {
                    *bytesused = plane_length;
                }
            }
            buffer.error = error;
            queue.done.push_back(buffer);
            true
        })
    }

    pub fn complete_all(&self, buffer_type: u32) -> usize {
        let mut count = 0;
        while self.complete(buffer_type, false) {
            count += 1;
        }
        count
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|call| **call == name).count()
    }

    fn handle(&self, cmd: &mut Ioctl<'_>) -> io::Result<()> {
        {
            let mut state = self.state();
            state.calls.push(cmd.name());
            if let Some((name, errno)) = state.fail_next {
                if name == cmd.name() {
                    state.fail_next = None;
                    return Err(io::Error::from_raw_os_error(errno));
                }
            }
        }

        match cmd {
            Ioctl::QueryCap(caps) => {
                copy_str(&mut caps.driver, self.config.driver);
                copy_str(&mut caps.card, self.config.card);
                copy_str(&mut caps.bus_info, "platform:virtual");
                caps.version = (6 << 16) | (1 << 8);
                caps.capabilities = self.config.device_caps | sys::V4L2_CAP_DEVICE_CAPS;
                caps.device_caps = self.config.device_caps;
                Ok(())
            }
            Ioctl::EnumFmt(desc) => match self.config.formats.get(desc.index as usize) {
                Some((pixelformat, _)) => {
                    desc.pixelformat = *pixelformat;
                    Ok(())
                }
                None => Err(einval()),
            },
            Ioctl::EnumFrameSizes(frmsize) => {
                let sizes = self
                    .config
                    .formats
                    .iter()
                    .find(|(pixelformat, _)| *pixelformat == frmsize.pixel_format)
                    .map(|(_, sizes)| sizes)
                    .ok_or_else(einval)?;
                let (width, height) = *sizes.get(frmsize.index as usize).ok_or_else(einval)?;
                frmsize.type_ = sys::V4L2_FRMSIZE_TYPE_DISCRETE;
                frmsize.size.discrete = sys::v4l2_frmsize_discrete { width, height };
                Ok(())
            }
            Ioctl::GetFormat(format) => {
                let buffer_type = format.type_;
                let stored = self.queue(buffer_type, |queue| queue.format);
                if let Some(stored) = stored {
                    **format = stored;
                }
                Ok(())
            }
            Ioctl::SetFormat(format) => {
                self.adjust_format(format)?;
                let applied = **format;
                self.queue(applied.type_, |queue| queue.format = Some(applied));
                Ok(())
            }
            Ioctl::RequestBuffers(req) => {
                let max = self.config.max_buffers;
                let (count, memory) = (req.count, req.memory);
                self.queue(req.type_, |queue| {
                    if queue.streaming && count > 0 {
                        return Err(io::Error::from_raw_os_error(libc::EBUSY));
                    }
                    queue.count = count.min(max);
                    queue.memory = memory;
                    queue.queued.clear();
                    queue.done.clear();
                    Ok(queue.count)
                })
                .map(|granted| req.count = granted)
            }
            Ioctl::QueryBuffer(buf) => {
                let count = self.queue(buf.type_, |queue| queue.count);
                if buf.index >= count {
                    return Err(einval());
                }
                if is_multiplanar(buf.type_) {
                    let planes = self.config.planes;
                    // SAFETY: the caller provides an array of buf.length planes.
                    let array = unsafe { buf.m.planes };
                    let capacity = buf.length;
                    for i in 0..planes.min(capacity) {
                        // SAFETY: i is below the array capacity.
                        unsafe { (*array.add(i as usize)).length = self.config.plane_length };
                    }
                    buf.length = planes;
                } else {
                    buf.length = self.config.plane_length;
                }
                Ok(())
            }
            Ioctl::ExportBuffer(expbuf) => {
                let count = self.queue(expbuf.type_, |queue| queue.count);
                if expbuf.index >= count || self.state().fail_export_at == Some(expbuf.index) {
                    return Err(einval());
                }
                let file = File::open("/dev/null")?;
                expbuf.fd = file.into_raw_fd();
                self.state().exported += 1;
                Ok(())
            }
            Ioctl::QueueBuffer(buf) => {
                let entry = read_buffer(buf);
                let index = buf.index;
                self.queue(buf.type_, |queue| {
                    if index >= queue.count
                        || queue.queued.iter().any(|queued| queued.index == index)
                    {
                        return Err(einval());
                    }
                    queue.queued.push_back(entry);
                    Ok(())
                })
            }
            Ioctl::DequeueBuffer(buf) => {
                let done = self.queue(buf.type_, |queue| queue.done.pop_front());
                let Some(done) = done else {
                    return Err(io::Error::from_raw_os_error(libc::EAGAIN));
                };
                write_buffer(buf, &done);
                Ok(())
            }
            Ioctl::StreamOn(buffer_type) => {
                self.queue(**buffer_type as u32, |queue| queue.streaming = true);
                Ok(())
            }
            Ioctl::StreamOff(buffer_type) => {
                self.queue(**buffer_type as u32, |queue| {
                    queue.streaming = false;
                    queue.queued.clear();
                    queue.done.clear();
                });
                Ok(())
            }
        }
    }

    /// Clamp the requested size and fill in strides and image sizes the
    /// caller left empty, as drivers do.
    fn adjust_format(&self, format: &mut sys::v4l2_format) -> io::Result<()> {
        let (max_width, max_height) = (self.config.max_width, self.config.max_height);
        if is_meta(format.type_) {
            // SAFETY: meta buffer types carry v4l2_meta_format.
            let mut meta = unsafe { format.fmt.meta };
            if meta.buffersize == 0 {
                meta.buffersize = self.config.plane_length;
            }
            format.fmt.meta = meta;
        } else if is_multiplanar(format.type_) {
            // SAFETY: multi-planar buffer types carry v4l2_pix_format_mplane.
            let mut pix = unsafe { format.fmt.pix_mp };
            pix.width = std::cmp::min(pix.width, max_width);
            pix.height = std::cmp::min(pix.height, max_height);
            let (width, height) = (pix.width, pix.height);
            let mut plane_fmt = pix.plane_fmt;
            for plane in plane_fmt.iter_mut().take(pix.num_planes as usize) {
                if plane.bytesperline == 0 {
                    plane.bytesperline = width;
                }
                if plane.sizeimage == 0 {
                    plane.sizeimage = plane.bytesperline * height;
                }
            }
            pix.plane_fmt = plane_fmt;
            format.fmt.pix_mp = pix;
        } else {
            // SAFETY: single-planar buffer types carry v4l2_pix_format.
            let mut pix = unsafe { format.fmt.pix };
            pix.width = std::cmp::min(pix.width, max_width);
            pix.height = std::cmp::min(pix.height, max_height);
            if pix.bytesperline < pix.width * 2 {
                pix.bytesperline = pix.width * 2;
            }
            pix.sizeimage = pix.bytesperline * pix.height;
            format.fmt.pix = pix;
        }
        Ok(())
    }
}

impl IoctlDevice for VirtualDevice {
    fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn ioctl(&self, cmd: &mut Ioctl<'_>) -> io::Result<()> {
        self.handle(cmd)
    }

    fn try_clone(&self) -> io::Result<Box<dyn IoctlDevice>> {
        Ok(Box::new(self.clone()))
    }
}

fn einval() -> io::Error {
    io::Error::from_raw_os_error(libc::EINVAL)
}

fn copy_str(dst: &mut [u8], src: &str) {
    let len = src.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&src.as_bytes()[..len]);
}

pub fn is_multiplanar(buffer_type: u32) -> bool {
    buffer_type == sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE
        || buffer_type == sys::V4L2_BUF_TYPE_VIDEO_OUTPUT_MPLANE
}

pub fn is_meta(buffer_type: u32) -> bool {
    buffer_type == sys::V4L2_BUF_TYPE_META_CAPTURE || buffer_type == sys::V4L2_BUF_TYPE_META_OUTPUT
}

pub fn is_capture(buffer_type: u32) -> bool {
    matches!(
        buffer_type,
        sys::V4L2_BUF_TYPE_VIDEO_CAPTURE
            | sys::V4L2_BUF_TYPE_VIDEO_CAPTURE_MPLANE
            | sys::V4L2_BUF_TYPE_META_CAPTURE
    )
}

fn read_buffer(buf: &sys::v4l2_buffer) -> QueuedBuffer {
    let dmabuf = buf.memory == sys::V4L2_MEMORY_DMABUF;
    let mut entry = QueuedBuffer {
        index: buf.index,
        sequence: buf.sequence,
        timestamp: (buf.timestamp.tv_sec as i64, buf.timestamp.tv_usec as i64),
        ..Default::default()
    };
    if is_multiplanar(buf.type_) {
        // SAFETY: multi-planar QBUF passes an array of buf.length planes.
        let array = unsafe { buf.m.planes };
        for i in 0..buf.length as usize {
            // SAFETY: i is below buf.length.
            let plane = unsafe { *array.add(i) };
            entry.bytesused.push(plane.bytesused);
            if dmabuf {
                // SAFETY: DMABUF planes carry a descriptor.
                entry.fds.push(unsafe { plane.m.fd });
            }
        }
    } else {
        entry.bytesused.push(buf.bytesused);
        if dmabuf {
            // SAFETY: DMABUF buffers carry a descriptor.
            entry.fds.push(unsafe { buf.m.fd });
        }
    }
    entry
}

fn write_buffer(buf: &mut sys::v4l2_buffer, done: &QueuedBuffer) {
    buf.index = done.index;
    buf.sequence = done.sequence;
    buf.timestamp.tv_sec = done.timestamp.0 as libc::time_t;
    buf.timestamp.tv_usec = done.timestamp.1 as libc::suseconds_t;
    buf.flags = sys::V4L2_BUF_FLAG_DONE;
    if done.error {
        buf.flags |= sys::V4L2_BUF_FLAG_ERROR;
    }
    if is_multiplanar(buf.type_) {
        // SAFETY: multi-planar DQBUF passes an array of buf.length planes.
        let array = unsafe { buf.m.planes };
        let count = done.bytesused.len().min(buf.length as usize);
        for (i, bytesused) in done.bytesused.iter().take(count).enumerate() {
            // SAFETY: i is below the array capacity.
            unsafe { (*array.add(i)).bytesused = *bytesused };
        }
        buf.length = count as u32;
    } else {
        buf.bytesused = done.bytesused.first().copied().unwrap_or(0);
    }
}

/// A frame buffer whose planes are backed by fresh /dev/null descriptors
pub fn null_buffer(lengths: &[u32]) -> camstack::framebuffer::FrameBuffer {
    use camstack::framebuffer::{FrameBuffer, FramePlane};
    use std::os::fd::OwnedFd;

    let planes = lengths
        .iter()
        .map(|length| {
            let file = File::open("/dev/null").expect("open /dev/null");
            FramePlane::new(OwnedFd::from(file), *length)
        })
        .collect();
    FrameBuffer::new(planes)
}

/// Listener collecting every delivered buffer
pub fn collector() -> (
    Rc<RefCell<Vec<camstack::framebuffer::FrameBuffer>>>,
    camstack::v4l2::BufferListener,
) {
    let sink = Rc::new(RefCell::new(Vec::new()));
    let listener_sink = sink.clone();
    let listener: camstack::v4l2::BufferListener =
        Box::new(move |buffer| listener_sink.borrow_mut().push(buffer));
    (sink, listener)
}
