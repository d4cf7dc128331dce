// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies
//
// Taken from https://docs.rs/crate/four-cc/latest and adapted to the
// little-endian packing shared by the V4L2 and DRM fourcc macros.
#![forbid(unsafe_code)]

use core::{fmt, result::Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Four-character code as used by `v4l2_fourcc()` and `fourcc_code()`.
///
/// The integer value is always `a | b << 8 | c << 16 | d << 24`, independent
/// of host byte order, so it can be written straight into kernel structures.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(C, packed)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> FourCC {
        FourCC([code[0], code[1], code[2], code[3]])
    }

    pub const fn from_u32(val: u32) -> FourCC {
        FourCC([
            (val & 0xff) as u8,
            (val >> 8 & 0xff) as u8,
            (val >> 16 & 0xff) as u8,
            (val >> 24 & 0xff) as u8,
        ])
    }

    pub const fn as_u32(self) -> u32 {
        (self.0[0] as u32)
            | (self.0[1] as u32) << 8
            | (self.0[2] as u32) << 16
            | (self.0[3] as u32) << 24
    }

    pub const fn is_null(self) -> bool {
        self.as_u32() == 0
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(buf: &[u8; 4]) -> FourCC {
        FourCC::new(buf)
    }
}

impl From<u32> for FourCC {
    fn from(val: u32) -> FourCC {
        FourCC::from_u32(val)
    }
}

impl From<FourCC> for u32 {
    fn from(val: FourCC) -> Self {
        val.as_u32()
    }
}

impl TryFrom<&str> for FourCC {
    type Error = crate::Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(crate::Error::InvalidArgument(format!(
                "fourcc must be four characters: {:?}",
                s
            )));
        }
        Ok(FourCC([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        match core::str::from_utf8(&b) {
            Ok(s) => f.write_str(s),
            Err(_) => {
                // If we return fmt::Error, then for example format!() will panic, so we choose
                // an alternative representation instead
                f.write_fmt(format_args!(
                    "{}{}{}{}",
                    core::ascii::escape_default(b[0]),
                    core::ascii::escape_default(b[1]),
                    core::ascii::escape_default(b[2]),
                    core::ascii::escape_default(b[3])
                ))
            }
        }
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let b = self.0;
        f.debug_tuple("FourCC")
            .field(&format_args!(
                "{}{}{}{}",
                core::ascii::escape_default(b[0]),
                core::ascii::escape_default(b[1]),
                core::ascii::escape_default(b[2]),
                core::ascii::escape_default(b[3])
            ))
            .finish()
    }
}

impl Serialize for FourCC {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FourCC {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FourCC::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc_packing_matches_kernel_macro() {
        // v4l2_fourcc('Y', 'U', 'Y', 'V')
        assert_eq!(FourCC::new(b"YUYV").as_u32(), 0x5659_5559);
        assert_eq!(FourCC::from_u32(0x3231_564e), FourCC(*b"NV12"));
    }

    #[test]
    fn test_fourcc_display() {
        assert_eq!(FourCC(*b"MJPG").to_string(), "MJPG");
        assert_eq!(FourCC([0xff, b'A', b'B', b'C']).to_string(), "\\xffABC");
    }

    #[test]
    fn test_fourcc_from_str() {
        assert_eq!(FourCC::try_from("NM12").ok(), Some(FourCC(*b"NM12")));
        assert!(FourCC::try_from("NV1").is_err());
    }

    #[test]
    fn test_fourcc_serde() {
        let json = serde_json::to_string(&FourCC(*b"BG24")).unwrap();
        assert_eq!(json, "\"BG24\"");
        let back: FourCC = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FourCC(*b"BG24"));
    }
}
