//! RGBA colors.

/// An 8-bit RGBA color. Alpha 255 is fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorDef {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for ColorDef {
    fn default() -> Self {
        Self::WHITE
    }
}

fn unit_to_u8(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl ColorDef {
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create from unit-interval components. A missing alpha means opaque.
    pub fn from_unit(rgba: &[f64]) -> Option<Self> {
        if rgba.len() < 3 {
            return None;
        }
        let alpha = rgba.get(3).copied().unwrap_or(1.0);
        Some(Self::rgba(
            unit_to_u8(rgba[0]),
            unit_to_u8(rgba[1]),
            unit_to_u8(rgba[2]),
            unit_to_u8(alpha),
        ))
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// The same color with alpha discarded.
    pub fn opaque(self) -> Self {
        self.with_alpha(255)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }
}
