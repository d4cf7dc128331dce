// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media Controller Graph Model
//!
//! A media device reports its hardware as a graph: entities (sensors,
//! bridges, ISPs, DMA engines) connected through pads by links. This module
//! holds that graph as parsed from `MEDIA_IOC_G_TOPOLOGY` and answers lookups
//! by name and by kernel id. Traversal policy, such as locating the sensor
//! feeding a given video node, is left to pipeline handlers.
//!
//! # Quick Start
//!
//! ```no_run
//! use camstack::media::MediaDevice;
//!
//! let media = MediaDevice::open("/dev/media0")?;
//! for entity in media.entities() {
//!     println!("{} {:?}", entity, entity.device_node());
//!     for pad in entity.pads() {
//!         for link in pad.links().iter().filter_map(|id| media.link(*id)) {
//!             println!("  {}", link);
//!         }
//!     }
//! }
//! # Ok::<(), camstack::Error>(())
//! ```
//!
//! # Ownership
//!
//! | Object | Owned by | Referenced by |
//! |--------|----------|---------------|
//! | [`MediaEntity`] | [`MediaDevice`] | [`EntityId`] |
//! | [`MediaPad`] | its [`MediaEntity`] | [`PadId`] |
//! | [`MediaLink`] | [`MediaDevice`] | [`LinkId`] |
//!
//! The graph is immutable once built. [`MediaGraphBuilder`] is the only way
//! to add objects.

mod device;
mod enumerator;
mod object;

pub use device::{MediaDevice, MediaDeviceInfo, MediaGraphBuilder};
pub use enumerator::{DeviceEnumerator, DeviceMatch, MediaDeviceList};
pub use object::{EntityId, LinkId, MediaEntity, MediaLink, MediaPad, PadId};
