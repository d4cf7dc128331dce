// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Media Device Matching
//!
//! This module provides the [`DeviceEnumerator`] seam pipeline handlers use
//! to claim the media devices they drive, and [`MediaDeviceList`], a simple
//! in-memory enumerator populated by the application.

use super::device::MediaDevice;
use crate::Error;
use log::{debug, info};
use std::{path::Path, rc::Rc};

/// Description of a media device a pipeline handler can drive
///
/// A device matches when its driver name is equal to [`DeviceMatch::driver`]
/// and it contains an entity for every name added with [`DeviceMatch::add`].
///
/// # Example
///
/// ```
/// use camstack::media::DeviceMatch;
///
/// let mut dm = DeviceMatch::new("unicam");
/// dm.add("unicam-image").add("unicam-embedded");
/// assert_eq!(dm.entities().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMatch {
    driver: String,
    entities: Vec<String>,
}

impl DeviceMatch {
    pub fn new(driver: &str) -> Self {
        Self {
            driver: driver.to_owned(),
            entities: Vec::new(),
        }
    }

    /// Require an entity called `entity`.
    pub fn add(&mut self, entity: &str) -> &mut Self {
        self.entities.push(entity.to_owned());
        self
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn matches(&self, device: &MediaDevice) -> bool {
        device.driver() == self.driver
            && self
                .entities
                .iter()
                .all(|name| device.entity_by_name(name).is_some())
    }
}

/// Source of media devices for pipeline handler matching
pub trait DeviceEnumerator {
    /// The first unclaimed device matching `dm`.
    fn search(&mut self, dm: &DeviceMatch) -> Option<Rc<MediaDevice>>;
}

/// Media devices registered by the application
///
/// # Example
///
/// ```no_run
/// use camstack::media::{DeviceEnumerator, DeviceMatch, MediaDeviceList};
///
/// let mut devices = MediaDeviceList::new();
/// devices.add_path("/dev/media0")?;
///
/// if let Some(media) = devices.search(&DeviceMatch::new("uvcvideo")) {
///     for entity in media.entities() {
///         println!("{}", entity);
///     }
/// }
/// # Ok::<(), camstack::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct MediaDeviceList {
    devices: Vec<Rc<MediaDevice>>,
}

impl MediaDeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, device: MediaDevice) -> Rc<MediaDevice> {
        let device = Rc::new(device);
        debug!("Added media device {}", device);
        self.devices.push(device.clone());
        device
    }

    /// Open the media node at `path` and add it.
    pub fn add_path(&mut self, path: impl AsRef<Path>) -> Result<Rc<MediaDevice>, Error> {
        Ok(self.add(MediaDevice::open(path)?))
    }

    pub fn devices(&self) -> &[Rc<MediaDevice>] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceEnumerator for MediaDeviceList {
    fn search(&mut self, dm: &DeviceMatch) -> Option<Rc<MediaDevice>> {
        let found = self
            .devices
            .iter()
            .find(|device| !device.is_acquired() && dm.matches(device))
            .cloned();
        if let Some(device) = &found {
            info!("Matched media device {} for driver {}", device, dm.driver());
        }
        found
    }
}
