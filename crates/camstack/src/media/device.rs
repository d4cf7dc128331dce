// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use super::object::{EntityId, LinkId, MediaEntity, MediaLink, MediaPad, PadId};
use crate::{v4l2::raw_ioctl, Error};
use camstack_sys as sys;
use log::{debug, error, warn};
use std::{
    cell::Cell,
    collections::HashMap,
    ffi::c_void,
    fmt,
    fs::{self, File, OpenOptions},
    io,
    os::fd::AsRawFd,
    path::{Path, PathBuf},
};

/// Topology queries retried when the graph changes between the two passes
const TOPOLOGY_RETRIES: usize = 8;

/// First media API version reporting pad indices
const MEDIA_V2_PAD_HAS_INDEX: u32 = (4 << 16) | (19 << 8);

/// Media device identification from `MEDIA_IOC_DEVICE_INFO`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    pub driver: String,
    pub model: String,
    pub serial: String,
    pub bus_info: String,
    pub media_version: u32,
    pub hw_revision: u32,
    pub driver_version: u32,
}

impl MediaDeviceInfo {
    pub fn from_raw(raw: &sys::media_device_info) -> Self {
        Self {
            driver: sys::c_str(&raw.driver),
            model: sys::c_str(&raw.model),
            serial: sys::c_str(&raw.serial),
            bus_info: sys::c_str(&raw.bus_info),
            media_version: raw.media_version,
            hw_revision: raw.hw_revision,
            driver_version: raw.driver_version,
        }
    }
}

/// A media controller device and the graph it reports.
///
/// The device is an arena: entities (with their pads) and links are stored
/// here and referenced elsewhere by kernel id.
pub struct MediaDevice {
    path: PathBuf,
    file: Option<File>,
    info: MediaDeviceInfo,
    topology_version: u64,
    entities: Vec<MediaEntity>,
    links: Vec<MediaLink>,
    entity_index: HashMap<EntityId, usize>,
    pad_index: HashMap<PadId, (usize, usize)>,
    link_index: HashMap<LinkId, usize>,
    acquired: Cell<bool>,
    locked: Cell<bool>,
}

impl MediaDevice {
    /// Open a media node and parse its topology.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let fd = file.as_raw_fd();

        let mut raw_info = sys::media_device_info::default();
        // SAFETY: raw_info matches the structure encoded in the request.
        unsafe {
            raw_ioctl(
                fd,
                sys::MEDIA_IOC_DEVICE_INFO,
                &mut raw_info as *mut _ as *mut c_void,
            )
        }
        .map_err(|source| {
            error!("{}: Failed to get media device info: {}", path.display(), source);
            Error::Ioctl {
                request: "MEDIA_IOC_DEVICE_INFO",
                source,
            }
        })?;
        let info = MediaDeviceInfo::from_raw(&raw_info);

        let topology = Topology::query(&file)?;
        let mut builder = MediaGraphBuilder::new(path, info);
        builder.device.topology_version = topology.version;
        builder.populate(&topology)?;

        let mut device = builder.build();
        device.file = Some(file);
        device.resolve_device_nodes();

        debug!(
            "{}: Opened media device {} with {} entities",
            path.display(),
            device.info.driver,
            device.entities.len()
        );
        Ok(device)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &MediaDeviceInfo {
        &self.info
    }

    pub fn driver(&self) -> &str {
        &self.info.driver
    }

    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    pub fn entities(&self) -> &[MediaEntity] {
        &self.entities
    }

    pub fn links(&self) -> &[MediaLink] {
        &self.links
    }

    pub fn entity(&self, id: EntityId) -> Option<&MediaEntity> {
        self.entity_index.get(&id).map(|&i| &self.entities[i])
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&MediaEntity> {
        self.entities.iter().find(|entity| entity.name() == name)
    }

    pub fn pad(&self, id: PadId) -> Option<&MediaPad> {
        self.pad_index
            .get(&id)
            .map(|&(entity, pad)| &self.entities[entity].pads[pad])
    }

    pub fn link(&self, id: LinkId) -> Option<&MediaLink> {
        self.link_index.get(&id).map(|&i| &self.links[i])
    }

    /// The link from `source` to `sink`, if one exists
    pub fn link_between(&self, source: PadId, sink: PadId) -> Option<&MediaLink> {
        self.links
            .iter()
            .find(|link| link.source() == source && link.sink() == sink)
    }

    /// Resolve each entity's device number to its `/dev` node through sysfs.
    pub fn resolve_device_nodes(&mut self) {
        for entity in &mut self.entities {
            let Some((major, minor)) = entity.device_number else {
                continue;
            };
            match device_node_path(major, minor) {
                Ok(node) => entity.device_node = Some(node),
                Err(err) => warn!(
                    "{}: No device node for entity {} ({}:{}): {}",
                    self.path.display(),
                    entity,
                    major,
                    minor,
                    err
                ),
            }
        }
    }

    /// Claim the device for one pipeline handler. Returns false if it is
    /// already claimed.
    pub fn acquire(&self) -> bool {
        if self.acquired.get() {
            return false;
        }
        self.acquired.set(true);
        true
    }

    pub fn release(&self) {
        self.acquired.set(false);
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.get()
    }

    /// Take the advisory lock on the media node, shared with other
    /// processes. Returns false if the device is already locked.
    pub fn lock(&self) -> bool {
        if self.locked.get() {
            return false;
        }
        if let Some(file) = &self.file {
            // SAFETY: the descriptor is owned by `file` and open.
            if unsafe { libc::lockf(file.as_raw_fd(), libc::F_TLOCK, 0) } != 0 {
                debug!(
                    "{}: Unable to lock: {}",
                    self.path.display(),
                    io::Error::last_os_error()
                );
                return false;
            }
        }
        self.locked.set(true);
        true
    }

    pub fn unlock(&self) {
        if !self.locked.get() {
            return;
        }
        if let Some(file) = &self.file {
            // SAFETY: the descriptor is owned by `file` and open.
            unsafe { libc::lockf(file.as_raw_fd(), libc::F_ULOCK, 0) };
        }
        self.locked.set(false);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }
}

impl fmt::Debug for MediaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDevice")
            .field("path", &self.path)
            .field("driver", &self.info.driver)
            .field("entities", &self.entities.len())
            .field("links", &self.links.len())
            .field("acquired", &self.acquired.get())
            .finish()
    }
}

impl fmt::Display for MediaDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.info.driver)
    }
}

impl Drop for MediaDevice {
    fn drop(&mut self) {
        self.unlock();
    }
}

fn device_node_path(major: u32, minor: u32) -> io::Result<PathBuf> {
    let uevent = fs::read_to_string(format!("/sys/dev/char/{}:{}/uevent", major, minor))?;
    uevent
        .lines()
        .find_map(|line| line.strip_prefix("DEVNAME="))
        .map(|name| Path::new("/dev").join(name))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no DEVNAME in uevent"))
}

/// Raw arrays returned by `MEDIA_IOC_G_TOPOLOGY`
#[derive(Default)]
pub(crate) struct Topology {
    pub version: u64,
    pub entities: Vec<sys::media_v2_entity>,
    pub interfaces: Vec<sys::media_v2_interface>,
    pub pads: Vec<sys::media_v2_pad>,
    pub links: Vec<sys::media_v2_link>,
}

impl Topology {
    /// Query the counts, size the arrays, then query again until the
    /// topology version is stable across two calls.
    fn query(file: &File) -> Result<Self, Error> {
        let mut topology = Topology::default();
        let mut version = None;

        for _ in 0..TOPOLOGY_RETRIES {
            let mut raw = sys::media_v2_topology {
                num_entities: u32::try_from(topology.entities.len())?,
                ptr_entities: array_ptr(&mut topology.entities),
                num_interfaces: u32::try_from(topology.interfaces.len())?,
                ptr_interfaces: array_ptr(&mut topology.interfaces),
                num_pads: u32::try_from(topology.pads.len())?,
                ptr_pads: array_ptr(&mut topology.pads),
                num_links: u32::try_from(topology.links.len())?,
                ptr_links: array_ptr(&mut topology.links),
                ..Default::default()
            };

            // SAFETY: every array pointer is either null or points to a
            // vector of exactly the advertised number of elements.
            let result = unsafe {
                raw_ioctl(
                    file.as_raw_fd(),
                    sys::MEDIA_IOC_G_TOPOLOGY,
                    &mut raw as *mut _ as *mut c_void,
                )
            };
            match result {
                Ok(()) => {}
                Err(err) if err.raw_os_error() == Some(libc::ENOSPC) => {
                    version = None;
                }
                Err(source) => {
                    error!("Failed to enumerate topology: {}", source);
                    return Err(Error::Ioctl {
                        request: "MEDIA_IOC_G_TOPOLOGY",
                        source,
                    });
                }
            }

            if version == Some(raw.topology_version) {
                topology.version = raw.topology_version;
                return Ok(topology);
            }

            version = Some(raw.topology_version);
            topology
                .entities
                .resize(raw.num_entities as usize, Default::default());
            topology
                .interfaces
                .resize(raw.num_interfaces as usize, Default::default());
            topology.pads.resize(raw.num_pads as usize, Default::default());
            topology.links.resize(raw.num_links as usize, Default::default());
        }

        Err(Error::InvalidState(
            "media topology kept changing while being read".to_owned(),
        ))
    }
}

fn array_ptr<T>(array: &mut [T]) -> u64 {
    if array.is_empty() {
        0
    } else {
        array.as_mut_ptr() as usize as u64
    }
}

/// Construction-time mutation of a media graph.
///
/// Every object is validated against those already added: a pad needs its
/// entity, a link needs both of its pads.
pub struct MediaGraphBuilder {
    device: MediaDevice,
}

impl MediaGraphBuilder {
    pub fn new(path: impl Into<PathBuf>, info: MediaDeviceInfo) -> Self {
        Self {
            device: MediaDevice {
                path: path.into(),
                file: None,
                info,
                topology_version: 0,
                entities: Vec::new(),
                links: Vec::new(),
                entity_index: HashMap::new(),
                pad_index: HashMap::new(),
                link_index: HashMap::new(),
                acquired: Cell::new(false),
                locked: Cell::new(false),
            },
        }
    }

    pub fn add_entity(
        &mut self,
        id: EntityId,
        name: &str,
        function: u32,
        flags: u32,
    ) -> Result<&mut Self, Error> {
        let device = &mut self.device;
        if device.entity_index.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("duplicate entity id {}", id)));
        }
        if device.entity_by_name(name).is_some() {
            return Err(Error::InvalidArgument(format!(
                "duplicate entity name '{}'",
                name
            )));
        }

        device.entity_index.insert(id, device.entities.len());
        device.entities.push(MediaEntity {
            id,
            name: name.to_owned(),
            function,
            flags,
            pads: Vec::new(),
            device_node: None,
            device_number: None,
        });
        Ok(self)
    }

    pub fn add_pad(
        &mut self,
        id: PadId,
        entity: EntityId,
        index: u32,
        flags: u32,
    ) -> Result<&mut Self, Error> {
        let device = &mut self.device;
        if device.pad_index.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("duplicate pad id {}", id)));
        }
        let &entity_pos = device
            .entity_index
            .get(&entity)
            .ok_or_else(|| Error::NotFound(format!("entity {} for pad {}", entity, id)))?;

        let pads = &mut device.entities[entity_pos].pads;
        device.pad_index.insert(id, (entity_pos, pads.len()));
        pads.push(MediaPad {
            id,
            entity,
            index,
            flags,
            links: Vec::new(),
        });
        Ok(self)
    }

    pub fn add_link(
        &mut self,
        id: LinkId,
        source: PadId,
        sink: PadId,
        flags: u32,
    ) -> Result<&mut Self, Error> {
        let device = &mut self.device;
        if device.link_index.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("duplicate link id {}", id)));
        }
        let &(source_entity, source_pad) = device
            .pad_index
            .get(&source)
            .ok_or_else(|| Error::NotFound(format!("source pad {} for link {}", source, id)))?;
        let &(sink_entity, sink_pad) = device
            .pad_index
            .get(&sink)
            .ok_or_else(|| Error::NotFound(format!("sink pad {} for link {}", sink, id)))?;

        device.link_index.insert(id, device.links.len());
        device.links.push(MediaLink {
            id,
            source,
            sink,
            flags,
        });
        device.entities[source_entity].pads[source_pad].links.push(id);
        device.entities[sink_entity].pads[sink_pad].links.push(id);
        Ok(self)
    }

    pub fn set_device_node(
        &mut self,
        entity: EntityId,
        node: impl Into<PathBuf>,
    ) -> Result<&mut Self, Error> {
        self.entity_mut(entity)?.device_node = Some(node.into());
        Ok(self)
    }

    pub fn set_device_number(
        &mut self,
        entity: EntityId,
        major: u32,
        minor: u32,
    ) -> Result<&mut Self, Error> {
        self.entity_mut(entity)?.device_number = Some((major, minor));
        Ok(self)
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut MediaEntity, Error> {
        let &pos = self
            .device
            .entity_index
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("entity {}", id)))?;
        Ok(&mut self.device.entities[pos])
    }

    /// Add every object of a kernel topology.
    ///
    /// Interface links supply the device number of the entity they point
    /// to. Ancillary links carry no data flow and are skipped.
    pub(crate) fn populate(&mut self, topology: &Topology) -> Result<(), Error> {
        for entity in &topology.entities {
            self.add_entity(
                EntityId(entity.id),
                &sys::c_str(&entity.name),
                entity.function,
                entity.flags,
            )?;
        }

        let has_index = self.device.info.media_version >= MEDIA_V2_PAD_HAS_INDEX;
        for pad in &topology.pads {
            let index = if has_index {
                pad.index
            } else {
                u32::try_from(self.entity_mut(EntityId(pad.entity_id))?.pads.len())?
            };
            self.add_pad(PadId(pad.id), EntityId(pad.entity_id), index, pad.flags)?;
        }

        for link in &topology.links {
            match link.flags & sys::MEDIA_LNK_FL_LINK_TYPE {
                sys::MEDIA_LNK_FL_DATA_LINK => {
                    self.add_link(
                        LinkId(link.id),
                        PadId(link.source_id),
                        PadId(link.sink_id),
                        link.flags,
                    )?;
                }
                sys::MEDIA_LNK_FL_INTERFACE_LINK => {
                    let Some(interface) = topology.interfaces.iter().find(|i| i.id == link.source_id)
                    else {
                        warn!("Interface {} not found for link {}", link.source_id, link.id);
                        continue;
                    };
                    // SAFETY: devnode is the interface union member for every
                    // interface type the kernel reports.
                    let devnode = unsafe { interface.u.devnode };
                    self.set_device_number(EntityId(link.sink_id), devnode.major, devnode.minor)?;
                }
                _ => debug!("Skipping link {} with flags {:#x}", link.id, link.flags),
            }
        }

        Ok(())
    }

    pub fn build(self) -> MediaDevice {
        self.device
    }
}
