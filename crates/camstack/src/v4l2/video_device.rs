// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use crate::{
    event::{EventKind, EventNotifier},
    fourcc::FourCC,
    framebuffer::{FrameBuffer, FramePlane, FrameStatus},
    media::{MediaDevice, MediaEntity},
    v4l2::{
        cache::V4L2BufferCache,
        device::{BufferType, Capability, Direction, FormatVariant, MemoryType},
        enumerator::{self, ImageFormats},
        format::{self, V4L2DeviceFormat},
        ioctl::{DeviceNode, Ioctl, IoctlDevice},
        pixel_format::{self, PixelFormat},
    },
    Error,
};
use camstack_sys as sys;
use log::{debug, error, warn};
use std::{
    collections::BTreeMap,
    error, fmt,
    os::fd::{FromRawFd, OwnedFd},
    path::{Path, PathBuf},
};

/// Completion listener invoked with every buffer leaving the device
pub type BufferListener = Box<dyn FnMut(FrameBuffer)>;

/// Why [`V4L2VideoDevice::queue_buffer`] handed a buffer back
#[derive(Debug)]
pub enum QueueError {
    /// Every kernel buffer index is in flight. Retry once a buffer completes.
    Busy(FrameBuffer),

    /// The device rejected the buffer.
    Failed { buffer: FrameBuffer, error: Error },
}

impl QueueError {
    pub fn is_busy(&self) -> bool {
        matches!(self, QueueError::Busy(_))
    }

    pub fn into_buffer(self) -> FrameBuffer {
        match self {
            QueueError::Busy(buffer) | QueueError::Failed { buffer, .. } => buffer,
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            QueueError::Busy(_) => write!(f, "No buffer available"),
            QueueError::Failed { error, .. } => write!(f, "Failed to queue buffer: {}", error),
        }
    }
}

impl error::Error for QueueError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            QueueError::Busy(_) => None,
            QueueError::Failed { error, .. } => Some(error),
        }
    }
}

/// A V4L2 video device node driving a single buffer queue.
///
/// The device is created closed. [`open`](Self::open) classifies it into one
/// of the capture, output, meta-capture or meta-output queue types, which
/// fixes the format codec for the lifetime of the open device.
///
/// Buffers are either exported from the device
/// ([`export_buffers`](Self::export_buffers)) or imported from elsewhere
/// ([`import_buffers`](Self::import_buffers)); either way they are queued by
/// value and come back through the listener set with
/// [`set_buffer_listener`](Self::set_buffer_listener).
///
/// # Example
///
/// ```no_run
/// use camstack::v4l2::V4L2VideoDevice;
/// use std::sync::mpsc;
///
/// let mut video = V4L2VideoDevice::new("/dev/video0");
/// video.open()?;
///
/// let (tx, rx) = mpsc::channel();
/// video.set_buffer_listener(Box::new(move |buffer| {
///     let _ = tx.send(buffer);
/// }));
///
/// for buffer in video.export_buffers(4)? {
///     if let Err(err) = video.queue_buffer(buffer) {
///         eprintln!("{}", err);
///     }
/// }
/// video.stream_on()?;
/// while !video.buffer_available()? {}
/// if let Ok(frame) = rx.try_recv() {
///     println!("sequence {}", frame.metadata().sequence);
/// }
/// video.stream_off()?;
/// # Ok::<(), camstack::Error>(())
/// ```
pub struct V4L2VideoDevice {
    device_node: PathBuf,
    io: Option<Box<dyn IoctlDevice>>,
    caps: Capability,
    buffer_type: Option<BufferType>,
    memory: MemoryType,
    cache: Option<V4L2BufferCache>,
    queued: BTreeMap<u32, FrameBuffer>,
    notifier: Option<EventNotifier>,
    listener: Option<BufferListener>,
    streaming: bool,
}

impl V4L2VideoDevice {
    pub fn new(device_node: impl Into<PathBuf>) -> Self {
        Self {
            device_node: device_node.into(),
            io: None,
            caps: Capability::default(),
            buffer_type: None,
            memory: MemoryType::Mmap,
            cache: None,
            queued: BTreeMap::new(),
            notifier: None,
            listener: None,
            streaming: false,
        }
    }

    /// Device for the video node of a media entity.
    pub fn from_entity(entity: &MediaEntity) -> Result<Self, Error> {
        match entity.device_node() {
            Some(node) => Ok(Self::new(node)),
            None => Err(Error::NotFound(format!(
                "device node for entity '{}'",
                entity.name()
            ))),
        }
    }

    /// Device for the video node of the entity called `name`.
    pub fn from_entity_name(media: &MediaDevice, name: &str) -> Result<Self, Error> {
        let entity = media
            .entity_by_name(name)
            .ok_or_else(|| Error::NotFound(format!("entity '{}'", name)))?;
        Self::from_entity(entity)
    }

    /// Device issuing its ioctls on `io` instead of opening `device_node`.
    pub fn with_io(device_node: impl Into<PathBuf>, io: Box<dyn IoctlDevice>) -> Self {
        let mut device = Self::new(device_node);
        device.io = Some(io);
        device
    }

    pub fn open(&mut self) -> Result<(), Error> {
        self.open_with(None)
    }

    /// Open with a forced queue direction. Memory-to-memory nodes advertise
    /// both directions and cannot be classified from their capabilities.
    pub(crate) fn open_as(&mut self, direction: Direction) -> Result<(), Error> {
        self.open_with(Some(direction))
    }

    fn open_with(&mut self, direction: Option<Direction>) -> Result<(), Error> {
        if self.is_open() {
            return Err(Error::InvalidState(format!(
                "{} is already open",
                self.device_node.display()
            )));
        }

        let io = match self.io.take() {
            Some(io) => io,
            None => Box::new(DeviceNode::open(&self.device_node).map_err(|err| {
                error!("Failed to open {}: {}", self.device_node.display(), err);
                Error::Io(err)
            })?),
        };

        let (caps, buffer_type) = match Self::probe(io.as_ref(), direction) {
            Ok(probed) => probed,
            Err(err) => {
                error!("{}: {}", self.device_node.display(), err);
                self.io = Some(io);
                return Err(err);
            }
        };

        let kind = match buffer_type.direction() {
            Direction::Capture => EventKind::Read,
            Direction::Output => EventKind::Write,
        };
        self.notifier = Some(EventNotifier::new(io.raw_fd(), kind));
        self.io = Some(io);
        self.caps = caps;
        self.buffer_type = Some(buffer_type);

        debug!(
            "{} Opened device {}: {}: {}",
            self.prefix(),
            caps.bus_info(),
            caps.driver(),
            caps.card()
        );

        Ok(())
    }

    fn probe(
        io: &dyn IoctlDevice,
        direction: Option<Direction>,
    ) -> Result<(Capability, BufferType), Error> {
        let mut raw = sys::v4l2_capability::default();
        io.ioctl(&mut Ioctl::QueryCap(&mut raw))
            .map_err(|source| Error::Ioctl {
                request: "VIDIOC_QUERYCAP",
                source,
            })?;
        let caps = Capability::from_raw(raw);
        let buffer_type = match direction {
            Some(direction) => BufferType::for_direction(&caps, direction)?,
            None => BufferType::classify(&caps)?,
        };
        Ok((caps, buffer_type))
    }

    /// Close the device, releasing its buffers.
    ///
    /// Closing a streaming device is refused. Buffers queued without the
    /// stream having been started are completed as cancelled.
    pub fn close(&mut self) -> Result<(), Error> {
        if !self.is_open() {
            return Ok(());
        }
        if self.streaming {
            return Err(Error::InvalidState(format!(
                "{} Cannot close while streaming",
                self.prefix()
            )));
        }

        let released = self.release_buffers();

        self.io = None;
        self.buffer_type = None;
        self.notifier = None;
        self.cache = None;

        released
    }

    pub fn is_open(&self) -> bool {
        self.buffer_type.is_some()
    }

    pub fn caps(&self) -> &Capability {
        &self.caps
    }

    pub fn device_node(&self) -> &Path {
        &self.device_node
    }

    pub fn buffer_type(&self) -> Option<BufferType> {
        self.buffer_type
    }

    pub fn direction(&self) -> Option<Direction> {
        self.buffer_type.map(BufferType::direction)
    }

    pub fn format_variant(&self) -> Option<FormatVariant> {
        self.buffer_type.map(BufferType::format_variant)
    }

    /// The V4L2 fourcc to program for `format` on this device
    pub fn to_v4l2_fourcc(&self, format: PixelFormat) -> Option<FourCC> {
        pixel_format::to_v4l2_fourcc(format, self.caps.is_multiplanar())
    }

    pub fn get_format(&self) -> Result<V4L2DeviceFormat, Error> {
        let buffer_type = self.queue_type()?;
        let mut raw = sys::v4l2_format {
            type_: buffer_type.as_raw(),
            ..Default::default()
        };
        self.ioctl(&mut Ioctl::GetFormat(&mut raw))?;
        format::decode(buffer_type.format_variant(), &raw)
    }

    /// Apply `format` and return what the driver accepted.
    pub fn set_format(&mut self, format: &V4L2DeviceFormat) -> Result<V4L2DeviceFormat, Error> {
        let buffer_type = self.queue_type()?;
        let variant = buffer_type.format_variant();
        let mut raw = format::encode(variant, buffer_type.as_raw(), format)?;
        self.ioctl(&mut Ioctl::SetFormat(&mut raw))?;
        let applied = format::decode(variant, &raw)?;
        debug!("{} Format set to {}", self.prefix(), applied);
        Ok(applied)
    }

    /// Pixel formats and frame sizes supported by the device queue.
    pub fn formats(&self) -> Result<ImageFormats, Error> {
        let buffer_type = self.queue_type()?;
        enumerator::enumerate(self.io()?, buffer_type.as_raw())
    }

    /// Allocate `count` buffers in the device and export them as dmabufs.
    ///
    /// Either all `count` buffers are returned or none: a failure part way
    /// through releases every buffer requested so far.
    pub fn export_buffers(&mut self, count: u32) -> Result<Vec<FrameBuffer>, Error> {
        if self.cache.is_some() {
            error!("{} Buffers already allocated", self.prefix());
            return Err(Error::AlreadyAllocated);
        }
        let buffer_type = self.queue_type()?;

        self.request_buffers(count, MemoryType::Mmap)?;

        let mut buffers = Vec::with_capacity(usize::try_from(count)?);
        for index in 0..count {
            match self.create_buffer(buffer_type, index) {
                Ok(buffer) => buffers.push(buffer),
                Err(err) => {
                    error!("{} Unable to create buffer {}: {}", self.prefix(), index, err);
                    buffers.clear();
                    if let Err(release) = self.request_buffers(0, MemoryType::Mmap) {
                        warn!("{} Unable to release buffers: {}", self.prefix(), release);
                    }
                    return Err(err);
                }
            }
        }

        self.cache = Some(V4L2BufferCache::from_buffers(&buffers));
        Ok(buffers)
    }

    fn create_buffer(&self, buffer_type: BufferType, index: u32) -> Result<FrameBuffer, Error> {
        let multiplanar = buffer_type.is_multiplanar();
        let mut planes = [sys::v4l2_plane::default(); sys::VIDEO_MAX_PLANES];
        let mut buf = sys::v4l2_buffer {
            index,
            type_: buffer_type.as_raw(),
            memory: MemoryType::Mmap.as_raw(),
            ..Default::default()
        };
        if multiplanar {
            buf.length = sys::VIDEO_MAX_PLANES as u32;
            buf.m.planes = planes.as_mut_ptr();
        }

        self.ioctl(&mut Ioctl::QueryBuffer(&mut buf))?;

        let num_planes = if multiplanar { buf.length } else { 1 };
        if num_planes == 0 || num_planes as usize > sys::VIDEO_MAX_PLANES {
            error!("{} Invalid number of planes ({})", self.prefix(), num_planes);
            return Err(Error::InvalidPlaneCount(num_planes));
        }

        let mut frame_planes = Vec::with_capacity(num_planes as usize);
        for plane in 0..num_planes {
            let fd = self.export_dmabuf_fd(buffer_type, index, plane)?;
            let length = if multiplanar {
                planes[plane as usize].length
            } else {
                buf.length
            };
            frame_planes.push(FramePlane::new(fd, length));
        }

        Ok(FrameBuffer::new(frame_planes))
    }

    fn export_dmabuf_fd(
        &self,
        buffer_type: BufferType,
        index: u32,
        plane: u32,
    ) -> Result<OwnedFd, Error> {
        let mut expbuf = sys::v4l2_exportbuffer {
            type_: buffer_type.as_raw(),
            index,
            plane,
            flags: libc::O_RDWR as u32,
            ..Default::default()
        };
        self.ioctl(&mut Ioctl::ExportBuffer(&mut expbuf))?;
        if expbuf.fd < 0 {
            return Err(Error::InvalidArgument(format!(
                "VIDIOC_EXPBUF returned descriptor {}",
                expbuf.fd
            )));
        }
        // SAFETY: EXPBUF hands a newly created descriptor to the caller.
        Ok(unsafe { OwnedFd::from_raw_fd(expbuf.fd) })
    }

    /// Prepare the device to queue `count` externally allocated dmabufs.
    pub fn import_buffers(&mut self, count: u32) -> Result<(), Error> {
        if self.cache.is_some() {
            error!("{} Buffers already allocated", self.prefix());
            return Err(Error::AlreadyAllocated);
        }

        let slots = usize::try_from(count)?;
        self.request_buffers(count, MemoryType::DmaBuf)?;
        self.cache = Some(V4L2BufferCache::new(slots));

        debug!("{} Prepared to import {} buffers", self.prefix(), count);
        Ok(())
    }

    /// Drop the buffer cache and free the device buffers. Safe to repeat.
    ///
    /// Buffers still queued are completed as cancelled first. Releasing is
    /// refused while streaming.
    pub fn release_buffers(&mut self) -> Result<(), Error> {
        if self.streaming {
            return Err(Error::InvalidState(format!(
                "{} Cannot release buffers while streaming",
                self.prefix()
            )));
        }
        debug!("{} Releasing buffers", self.prefix());
        self.cancel_queued();
        self.cache = None;
        self.request_buffers(0, self.memory).map(|_| ())
    }

    fn request_buffers(&mut self, count: u32, memory: MemoryType) -> Result<u32, Error> {
        let buffer_type = self.queue_type()?;
        let mut req = sys::v4l2_requestbuffers {
            count,
            type_: buffer_type.as_raw(),
            memory: memory.as_raw(),
            ..Default::default()
        };
        self.ioctl(&mut Ioctl::RequestBuffers(&mut req))?;
        self.memory = memory;

        if req.count < count {
            error!(
                "{} Not enough buffers provided by device ({} < {})",
                self.prefix(),
                req.count,
                count
            );
            let allocated = req.count;
            if let Err(err) = self.request_buffers(0, memory) {
                warn!("{} Unable to release buffers: {}", self.prefix(), err);
            }
            return Err(Error::InsufficientBuffers {
                requested: count,
                allocated,
            });
        }

        debug!("{} {} buffers requested", self.prefix(), req.count);
        Ok(req.count)
    }

    /// Number of kernel buffer slots, zero when unallocated
    pub fn buffer_count(&self) -> usize {
        self.cache.as_ref().map_or(0, V4L2BufferCache::len)
    }

    /// Queue `buffer` on the device.
    ///
    /// On success the device owns the buffer until it is dequeued or
    /// cancelled. When every kernel slot is in use the buffer is handed
    /// back in [`QueueError::Busy`].
    pub fn queue_buffer(&mut self, buffer: FrameBuffer) -> Result<(), QueueError> {
        let buffer_type = match self.queue_type() {
            Ok(buffer_type) => buffer_type,
            Err(error) => return Err(QueueError::Failed { buffer, error }),
        };
        if buffer.planes().is_empty() || buffer.planes().len() > sys::VIDEO_MAX_PLANES {
            let error = Error::InvalidArgument(format!(
                "buffer carries {} planes",
                buffer.planes().len()
            ));
            return Err(QueueError::Failed { buffer, error });
        }

        let Some(cache) = self.cache.as_mut() else {
            return Err(QueueError::Failed {
                buffer,
                error: Error::NotAllocated,
            });
        };
        let Some(index) = cache.get(&buffer) else {
            debug!("{} No buffer available", self.prefix());
            return Err(QueueError::Busy(buffer));
        };
        let slot = match u32::try_from(index) {
            Ok(slot) => slot,
            Err(err) => {
                cache.put(index);
                return Err(QueueError::Failed {
                    buffer,
                    error: err.into(),
                });
            }
        };

        let multiplanar = buffer_type.is_multiplanar();
        let planes = buffer.planes();
        let mut v4l2_planes = [sys::v4l2_plane::default(); sys::VIDEO_MAX_PLANES];
        let mut buf = sys::v4l2_buffer {
            index: slot,
            type_: buffer_type.as_raw(),
            memory: self.memory.as_raw(),
            field: sys::V4L2_FIELD_NONE,
            ..Default::default()
        };

        if self.memory == MemoryType::DmaBuf {
            if multiplanar {
                for (dst, plane) in v4l2_planes.iter_mut().zip(planes) {
                    dst.m.fd = plane.raw_fd();
                }
            } else {
                buf.m.fd = planes[0].raw_fd();
            }
        }

        if buffer_type.direction() == Direction::Output {
            let metadata = buffer.metadata();
            if multiplanar {
                for ((dst, plane), bytesused) in
                    v4l2_planes.iter_mut().zip(planes).zip(&metadata.planes)
                {
                    dst.bytesused = *bytesused;
                    dst.length = plane.length();
                }
            } else if let Some(bytesused) = metadata.planes.first() {
                buf.bytesused = *bytesused;
            }

            buf.sequence = metadata.sequence;
            buf.timestamp.tv_sec = (metadata.timestamp / 1_000_000_000) as libc::time_t;
            buf.timestamp.tv_usec = ((metadata.timestamp / 1000) % 1_000_000) as libc::suseconds_t;
        }

        if multiplanar {
            buf.length = planes.len() as u32;
            buf.m.planes = v4l2_planes.as_mut_ptr();
        }

        debug!("{} Queueing buffer {}", self.prefix(), index);

        if let Err(error) = self.ioctl(&mut Ioctl::QueueBuffer(&mut buf)) {
            if let Some(cache) = self.cache.as_mut() {
                cache.put(index);
            }
            return Err(QueueError::Failed { buffer, error });
        }

        if self.queued.is_empty() {
            self.set_notifier_enabled(true);
        }
        self.queued.insert(slot, buffer);

        Ok(())
    }

    /// Dequeue the next completed buffer, or `None` if none is ready.
    pub fn dequeue_buffer(&mut self) -> Result<Option<FrameBuffer>, Error> {
        let buffer_type = self.queue_type()?;
        if self.cache.is_none() {
            return Err(Error::NotAllocated);
        }
        let multiplanar = buffer_type.is_multiplanar();

        let mut planes = [sys::v4l2_plane::default(); sys::VIDEO_MAX_PLANES];
        let mut buf = sys::v4l2_buffer {
            type_: buffer_type.as_raw(),
            memory: self.memory.as_raw(),
            ..Default::default()
        };
        if multiplanar {
            buf.length = sys::VIDEO_MAX_PLANES as u32;
            buf.m.planes = planes.as_mut_ptr();
        }

        match self.io()?.ioctl(&mut Ioctl::DequeueBuffer(&mut buf)) {
            Ok(()) => {}
            Err(err) if err.raw_os_error() == Some(libc::EAGAIN) => return Ok(None),
            Err(source) => {
                error!("{} Failed to dequeue buffer: {}", self.prefix(), source);
                return Err(Error::Ioctl {
                    request: "VIDIOC_DQBUF",
                    source,
                });
            }
        }

        let index = buf.index;
        let slot = usize::try_from(index)?;
        debug!("{} Dequeuing buffer {}", self.prefix(), index);

        let Some(mut buffer) = self.queued.remove(&index) else {
            error!("{} Dequeued buffer {} was not queued", self.prefix(), index);
            return Err(Error::InvalidState(format!(
                "dequeued buffer {} was not queued",
                index
            )));
        };
        if let Some(cache) = self.cache.as_mut() {
            cache.put(slot);
        }
        if self.queued.is_empty() {
            self.set_notifier_enabled(false);
        }

        let metadata = buffer.metadata_mut();
        metadata.status = if buf.flags & sys::V4L2_BUF_FLAG_ERROR != 0 {
            FrameStatus::Error
        } else {
            FrameStatus::Success
        };
        metadata.sequence = buf.sequence;
        metadata.timestamp = (buf.timestamp.tv_sec as u64) * 1_000_000_000
            + (buf.timestamp.tv_usec as u64) * 1000;
        metadata.planes = if multiplanar {
            let count = (buf.length as usize).min(sys::VIDEO_MAX_PLANES);
            planes[..count].iter().map(|plane| plane.bytesused).collect()
        } else {
            vec![buf.bytesused]
        };

        Ok(Some(buffer))
    }

    /// Readiness handler: dequeue one buffer and hand it to the listener.
    ///
    /// Returns whether a buffer was delivered. A burst of completions takes
    /// one call each.
    pub fn buffer_available(&mut self) -> Result<bool, Error> {
        match self.dequeue_buffer()? {
            Some(buffer) => {
                self.deliver(buffer);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn stream_on(&mut self) -> Result<(), Error> {
        let buffer_type = self.queue_type()?;
        let mut arg = buffer_type.as_raw() as libc::c_int;
        self.ioctl(&mut Ioctl::StreamOn(&mut arg))?;
        self.streaming = true;
        debug!("{} Stream on", self.prefix());
        Ok(())
    }

    /// Stop streaming and complete every in-flight buffer as cancelled.
    pub fn stream_off(&mut self) -> Result<(), Error> {
        let buffer_type = self.queue_type()?;
        let mut arg = buffer_type.as_raw() as libc::c_int;
        self.ioctl(&mut Ioctl::StreamOff(&mut arg))?;

        self.cancel_queued();
        self.streaming = false;
        debug!("{} Stream off", self.prefix());
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn cancel_queued(&mut self) {
        let queued = std::mem::take(&mut self.queued);
        for (index, mut buffer) in queued {
            if let (Some(cache), Ok(slot)) = (self.cache.as_mut(), usize::try_from(index)) {
                cache.put(slot);
            }
            buffer.metadata_mut().status = FrameStatus::Cancelled;
            self.deliver(buffer);
        }
        self.set_notifier_enabled(false);
    }

    /// Set the single listener receiving completed and cancelled buffers.
    pub fn set_buffer_listener(&mut self, listener: BufferListener) {
        self.listener = Some(listener);
    }

    fn deliver(&mut self, buffer: FrameBuffer) {
        match self.listener.as_mut() {
            Some(listener) => listener(buffer),
            None => warn!(
                "{} No buffer listener, dropping buffer {}",
                self.prefix(),
                buffer
            ),
        }
    }

    /// Readiness registration of the open device. Enabled only while
    /// buffers are in flight.
    pub fn notifier(&self) -> Option<EventNotifier> {
        self.notifier
    }

    fn set_notifier_enabled(&mut self, enabled: bool) {
        if let Some(notifier) = self.notifier.as_mut() {
            notifier.set_enabled(enabled);
        }
    }

    /// Number of buffers queued and not yet completed
    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    fn queue_type(&self) -> Result<BufferType, Error> {
        self.buffer_type.ok_or(Error::NotOpen)
    }

    fn io(&self) -> Result<&dyn IoctlDevice, Error> {
        match (&self.io, self.buffer_type) {
            (Some(io), Some(_)) => Ok(io.as_ref()),
            _ => Err(Error::NotOpen),
        }
    }

    fn ioctl(&self, cmd: &mut Ioctl<'_>) -> Result<(), Error> {
        let request = cmd.name();
        self.io()?.ioctl(cmd).map_err(|source| {
            error!("{} {} failed: {}", self.prefix(), request, source);
            Error::Ioctl { request, source }
        })
    }

    fn prefix(&self) -> String {
        match self.buffer_type {
            Some(buffer_type) => format!(
                "{}[{}]:",
                self.device_node.display(),
                buffer_type.direction()
            ),
            None => format!("{}:", self.device_node.display()),
        }
    }
}

impl fmt::Debug for V4L2VideoDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("V4L2VideoDevice")
            .field("device_node", &self.device_node)
            .field("buffer_type", &self.buffer_type)
            .field("memory", &self.memory)
            .field("queued", &self.queued.len())
            .field("streaming", &self.streaming)
            .finish()
    }
}

impl Drop for V4L2VideoDevice {
    fn drop(&mut self) {
        if self.streaming {
            if let Err(err) = self.stream_off() {
                warn!("{} Stream off on drop failed: {}", self.prefix(), err);
                self.streaming = false;
            }
        }
        if let Err(err) = self.close() {
            warn!("{} Close on drop failed: {}", self.prefix(), err);
        }
    }
}
