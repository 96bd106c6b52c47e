//! Garment color parsing.

use std::fmt;
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DesignError;

/// The single, design-wide garment color.
///
/// Pure white and pure black are sentinels: white means "no tint", black
/// selects a dedicated pre-rendered black garment instead of tinting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GarmentColor([u8; 3]);

impl GarmentColor {
    pub const WHITE: Self = Self([255, 255, 255]);
    pub const BLACK: Self = Self([0, 0, 0]);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self([red, green, blue])
    }

    /// Parses a `#rrggbb` (or `rrggbb`) string, case-insensitive.
    pub fn parse(hex: &str) -> Result<Self, DesignError> {
        let trimmed = hex.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DesignError::InvalidColor(hex.to_string()));
        }
        Srgb::<u8>::from_str(digits)
            .map(|c| Self([c.red, c.green, c.blue]))
            .map_err(|_| DesignError::InvalidColor(hex.to_string()))
    }

    pub fn is_white(&self) -> bool {
        *self == Self::WHITE
    }

    pub fn is_black(&self) -> bool {
        *self == Self::BLACK
    }

    /// Returns the color as an `(r, g, b)` tuple.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let [r, g, b] = self.0;
        (r, g, b)
    }

    /// Returns the lowercase `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.rgb();
        format!("#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl Default for GarmentColor {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for GarmentColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for GarmentColor {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GarmentColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for GarmentColor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::parse(&hex).map_err(serde::de::Error::custom)
    }
}
