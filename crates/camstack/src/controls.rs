// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use log::error;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Numeric identifier of a camera control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControlId(pub u32);

impl ControlId {
    pub const AE_ENABLE: ControlId = ControlId(1);
    pub const EXPOSURE_TIME: ControlId = ControlId(2);
    pub const ANALOGUE_GAIN: ControlId = ControlId(3);
    pub const BRIGHTNESS: ControlId = ControlId(4);
    pub const CONTRAST: ControlId = ControlId(5);
    pub const AWB_ENABLE: ControlId = ControlId(6);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            ControlId::AE_ENABLE => Some("AeEnable"),
            ControlId::EXPOSURE_TIME => Some("ExposureTime"),
            ControlId::ANALOGUE_GAIN => Some("AnalogueGain"),
            ControlId::BRIGHTNESS => Some("Brightness"),
            ControlId::CONTRAST => Some("Contrast"),
            ControlId::AWB_ENABLE => Some("AwbEnable"),
            _ => None,
        }
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum ControlValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ControlValue::Bool(v) => write!(f, "{}", v),
            ControlValue::Int32(v) => write!(f, "{}", v),
            ControlValue::Int64(v) => write!(f, "{}", v),
            ControlValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Range and default of a control
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlInfo {
    pub min: ControlValue,
    pub max: ControlValue,
    pub default: ControlValue,
}

impl ControlInfo {
    pub fn new(min: ControlValue, max: ControlValue, default: ControlValue) -> Self {
        Self { min, max, default }
    }

    /// Whether `value` has the control's type and lies within its range
    pub fn accepts(&self, value: &ControlValue) -> bool {
        std::mem::discriminant(value) == std::mem::discriminant(&self.min)
            && *value >= self.min
            && *value <= self.max
    }
}

impl fmt::Display for ControlInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}..{}] default {}", self.min, self.max, self.default)
    }
}

/// The controls a camera supports, advertised to applications
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlInfoMap {
    controls: BTreeMap<ControlId, ControlInfo>,
}

impl ControlInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ControlId, info: ControlInfo) -> &mut Self {
        self.controls.insert(id, info);
        self
    }

    pub fn get(&self, id: ControlId) -> Option<&ControlInfo> {
        self.controls.get(&id)
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.controls.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlId, &ControlInfo)> {
        self.controls.iter()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

/// Control values carried by a request, or reported back as metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlList {
    values: BTreeMap<ControlId, ControlValue>,
    info: Option<ControlInfoMap>,
}

impl ControlList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A list validated against the controls a camera supports
    pub fn with_info(info: ControlInfoMap) -> Self {
        Self {
            values: BTreeMap::new(),
            info: Some(info),
        }
    }

    /// Set `id` to `value`. Returns false, leaving the list unchanged, if
    /// the list validates against a control map that rejects the value.
    pub fn set(&mut self, id: ControlId, value: ControlValue) -> bool {
        if let Some(info) = &self.info {
            match info.get(id) {
                None => {
                    error!("Control {} is not supported", id);
                    return false;
                }
                Some(control) if !control.accepts(&value) => {
                    error!("Control {} value {} outside {}", id, value, control);
                    return false;
                }
                Some(_) => {}
            }
        }
        self.values.insert(id, value);
        true
    }

    pub fn get(&self, id: ControlId) -> Option<ControlValue> {
        self.values.get(&id).copied()
    }

    pub fn contains(&self, id: ControlId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ControlId, &ControlValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor_controls() -> ControlInfoMap {
        let mut map = ControlInfoMap::new();
        map.insert(
            ControlId::EXPOSURE_TIME,
            ControlInfo::new(
                ControlValue::Int32(100),
                ControlValue::Int32(66_000),
                ControlValue::Int32(10_000),
            ),
        )
        .insert(
            ControlId::AE_ENABLE,
            ControlInfo::new(
                ControlValue::Bool(false),
                ControlValue::Bool(true),
                ControlValue::Bool(true),
            ),
        );
        map
    }

    #[test]
    fn test_validated_list_rejects_unknown_and_out_of_range() {
        let mut list = ControlList::with_info(sensor_controls());
        assert!(list.set(ControlId::EXPOSURE_TIME, ControlValue::Int32(1700)));
        assert!(!list.set(ControlId::EXPOSURE_TIME, ControlValue::Int32(70_000)));
        assert!(!list.set(ControlId::EXPOSURE_TIME, ControlValue::Float(1.0)));
        assert!(!list.set(ControlId::BRIGHTNESS, ControlValue::Float(0.5)));
        assert_eq!(list.get(ControlId::EXPOSURE_TIME), Some(ControlValue::Int32(1700)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unvalidated_list_accepts_anything() {
        let mut list = ControlList::new();
        assert!(list.set(ControlId(0x9999), ControlValue::Int64(-1)));
        assert_eq!(ControlId(0x9999).to_string(), "0x9999");
        assert_eq!(ControlId::ANALOGUE_GAIN.to_string(), "AnalogueGain");
    }
}
