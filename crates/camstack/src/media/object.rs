// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Entities, pads and links of a media graph.
//!
//! Objects are identified by the ids the kernel assigned them. Back
//! references (pad to entity, pad to link, link to pad) are ids resolved
//! through the owning [`super::MediaDevice`].

use camstack_sys as sys;
use std::{
    fmt,
    path::{Path, PathBuf},
};

macro_rules! object_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

object_id!(
    /// Kernel id of a media entity
    EntityId
);
object_id!(
    /// Kernel id of a media pad
    PadId
);
object_id!(
    /// Kernel id of a media link
    LinkId
);

/// A hardware block of the media graph, such as a sensor or a DMA engine
#[derive(Debug, Clone)]
pub struct MediaEntity {
    pub(super) id: EntityId,
    pub(super) name: String,
    pub(super) function: u32,
    pub(super) flags: u32,
    pub(super) pads: Vec<MediaPad>,
    pub(super) device_node: Option<PathBuf>,
    pub(super) device_number: Option<(u32, u32)>,
}

impl MediaEntity {
    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `MEDIA_ENT_F_*` function of the entity
    pub fn function(&self) -> u32 {
        self.function
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Pads in discovery order
    pub fn pads(&self) -> &[MediaPad] {
        &self.pads
    }

    pub fn pad_at(&self, index: u32) -> Option<&MediaPad> {
        self.pads.iter().find(|pad| pad.index == index)
    }

    pub fn pad_by_id(&self, id: PadId) -> Option<&MediaPad> {
        self.pads.iter().find(|pad| pad.id == id)
    }

    /// Path of the device node exposing this entity, once resolved
    pub fn device_node(&self) -> Option<&Path> {
        self.device_node.as_deref()
    }

    /// Character device (major, minor) of the entity's interface
    pub fn device_number(&self) -> Option<(u32, u32)> {
        self.device_number
    }

    /// Whether this entity is a V4L2 video node (DMA engine)
    pub fn is_video_node(&self) -> bool {
        self.function == sys::MEDIA_ENT_F_IO_V4L
    }
}

impl fmt::Display for MediaEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.name, self.id)
    }
}

/// A connection point of an entity
#[derive(Debug, Clone)]
pub struct MediaPad {
    pub(super) id: PadId,
    pub(super) entity: EntityId,
    pub(super) index: u32,
    pub(super) flags: u32,
    pub(super) links: Vec<LinkId>,
}

impl MediaPad {
    pub fn id(&self) -> PadId {
        self.id
    }

    /// The entity owning this pad
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// 0-based index of the pad within its entity
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Links this pad is the source or sink of, in discovery order
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn is_source(&self) -> bool {
        self.flags & sys::MEDIA_PAD_FL_SOURCE != 0
    }

    pub fn is_sink(&self) -> bool {
        self.flags & sys::MEDIA_PAD_FL_SINK != 0
    }
}

/// A data link from a source pad to a sink pad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaLink {
    pub(super) id: LinkId,
    pub(super) source: PadId,
    pub(super) sink: PadId,
    pub(super) flags: u32,
}

impl MediaLink {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn source(&self) -> PadId {
        self.source
    }

    pub fn sink(&self) -> PadId {
        self.sink
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_enabled(&self) -> bool {
        self.flags & sys::MEDIA_LNK_FL_ENABLED != 0
    }

    pub fn is_immutable(&self) -> bool {
        self.flags & sys::MEDIA_LNK_FL_IMMUTABLE != 0
    }
}

impl fmt::Display for MediaLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} [{}]",
            self.source,
            self.sink,
            if self.is_enabled() { "ENABLED" } else { "DISABLED" }
        )
    }
}
