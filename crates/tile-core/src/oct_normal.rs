//! Octahedral encoding of unit vectors into 16 bits.
//!
//! The unit sphere is projected onto an octahedron and unfolded into the
//! unit square. Each of the two square coordinates is stored in one byte;
//! the packed value is `y << 8 | x`.

use glam::Vec3;

/// A unit vector packed into 16 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OctEncodedNormal(pub u16);

fn sign_not_zero(value: f32) -> f32 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

fn clamp_u8(value: f32) -> u16 {
    ((value.clamp(-1.0, 1.0) * 0.5 + 0.5) * 255.0).round() as u16
}

impl OctEncodedNormal {
    /// Encode a direction. The input need not be normalized; a zero vector
    /// encodes as +Z.
    pub fn encode(vector: Vec3) -> Self {
        let denom = vector.x.abs() + vector.y.abs() + vector.z.abs();
        if denom == 0.0 || !denom.is_finite() {
            return Self::encode(Vec3::Z);
        }

        let mut rx = vector.x / denom;
        let mut ry = vector.y / denom;
        if vector.z < 0.0 {
            let x = rx;
            let y = ry;
            rx = (1.0 - y.abs()) * sign_not_zero(x);
            ry = (1.0 - x.abs()) * sign_not_zero(y);
        }

        Self(clamp_u8(ry) << 8 | clamp_u8(rx))
    }

    /// Build from the two stored bytes.
    pub fn from_bytes(x: u8, y: u8) -> Self {
        Self((y as u16) << 8 | x as u16)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    /// Decode to a unit vector.
    pub fn decode(&self) -> Vec3 {
        let ex = (self.0 & 0xff) as f32 / 255.0 * 2.0 - 1.0;
        let ey = (self.0 >> 8) as f32 / 255.0 * 2.0 - 1.0;
        let z = 1.0 - ex.abs() - ey.abs();

        let (x, y) = if z < 0.0 {
            (
                (1.0 - ey.abs()) * sign_not_zero(ex),
                (1.0 - ex.abs()) * sign_not_zero(ey),
            )
        } else {
            (ex, ey)
        };

        Vec3::new(x, y, z).normalize()
    }
}
