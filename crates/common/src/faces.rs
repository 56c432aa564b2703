use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// One of the six faces of a unit cube.
///
/// The discriminant is the bit position of the face inside a [`FaceMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Face {
    Top = 0,
    Front = 1,
    Left = 2,
    Right = 3,
    Back = 4,
    Bottom = 5,
}

impl Face {
    /// All faces in mask bit order.
    pub const ALL: [Face; 6] = [
        Face::Top,
        Face::Front,
        Face::Left,
        Face::Right,
        Face::Back,
        Face::Bottom,
    ];

    pub fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Outward unit normal.
    pub fn normal(self) -> Vec3 {
        self.offset().as_vec3()
    }

    /// Offset to the neighboring cell that can occlude this face.
    pub fn offset(self) -> IVec3 {
        match self {
            Face::Top => IVec3::Y,
            Face::Front => IVec3::Z,
            Face::Left => IVec3::NEG_X,
            Face::Right => IVec3::X,
            Face::Back => IVec3::NEG_Z,
            Face::Bottom => IVec3::NEG_Y,
        }
    }

    pub fn opposite(self) -> Face {
        match self {
            Face::Top => Face::Bottom,
            Face::Front => Face::Back,
            Face::Left => Face::Right,
            Face::Right => Face::Left,
            Face::Back => Face::Front,
            Face::Bottom => Face::Top,
        }
    }
}

/// Six-bit set of exposed cube faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FaceMask(u8);

impl FaceMask {
    pub const NONE: FaceMask = FaceMask(0);
    pub const ALL: FaceMask = FaceMask(0b11_1111);

    /// Build a mask from raw bits; bits above the sixth are dropped.
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, face: Face) -> bool {
        self.0 & face.bit() != 0
    }

    pub fn with(self, face: Face) -> Self {
        Self(self.0 | face.bit())
    }

    pub fn without(self, face: Face) -> Self {
        Self(self.0 & !face.bit())
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Set faces in mask bit order.
    pub fn faces(self) -> impl Iterator<Item = Face> {
        Face::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

impl FromIterator<Face> for FaceMask {
    fn from_iter<I: IntoIterator<Item = Face>>(iter: I) -> Self {
        iter.into_iter().fold(FaceMask::NONE, FaceMask::with)
    }
}

/// Atlas tile index for each face of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FaceTiles([u32; 6]);

impl FaceTiles {
    /// Same tile on every face.
    pub fn uniform(tile: u32) -> Self {
        Self([tile; 6])
    }

    /// Tiles in mask bit order: top, front, left, right, back, bottom.
    pub fn new(top: u32, front: u32, left: u32, right: u32, back: u32, bottom: u32) -> Self {
        Self([top, front, left, right, back, bottom])
    }

    /// Distinct top, side and bottom tiles (grass-like blocks).
    pub fn column(top: u32, side: u32, bottom: u32) -> Self {
        Self([top, side, side, side, side, bottom])
    }

    pub fn get(&self, face: Face) -> u32 {
        self.0[face as usize]
    }

    pub fn set(&mut self, face: Face, tile: u32) {
        self.0[face as usize] = tile;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_order_matches_mask_layout() {
        assert_eq!(Face::Top.bit(), 0b00_0001);
        assert_eq!(Face::Front.bit(), 0b00_0010);
        assert_eq!(Face::Left.bit(), 0b00_0100);
        assert_eq!(Face::Right.bit(), 0b00_1000);
        assert_eq!(Face::Back.bit(), 0b01_0000);
        assert_eq!(Face::Bottom.bit(), 0b10_0000);
    }

    #[test]
    fn opposite_faces_have_opposite_normals() {
        for face in Face::ALL {
            assert_eq!(face.normal(), -face.opposite().normal());
            assert_eq!(face.opposite().opposite(), face);
        }
    }

    #[test]
    fn mask_drops_high_bits() {
        let m = FaceMask::from_bits(0xff);
        assert_eq!(m, FaceMask::ALL);
        assert_eq!(m.count(), 6);
    }

    #[test]
    fn mask_faces_iterates_in_bit_order() {
        let m = FaceMask::from_bits(0b10_0101);
        let faces: Vec<Face> = m.faces().collect();
        assert_eq!(faces, vec![Face::Top, Face::Left, Face::Bottom]);
    }

    #[test]
    fn mask_with_and_without() {
        let m = FaceMask::NONE.with(Face::Back).with(Face::Top);
        assert!(m.contains(Face::Back));
        assert!(!m.contains(Face::Front));
        assert!(m.without(Face::Back).without(Face::Top).is_empty());
    }

    #[test]
    fn mask_collects_from_faces() {
        let m: FaceMask = [Face::Right, Face::Front].into_iter().collect();
        assert_eq!(m.bits(), 0b00_1010);
    }

    #[test]
    fn tiles_column_layout() {
        let t = FaceTiles::column(0, 1, 2);
        assert_eq!(t.get(Face::Top), 0);
        assert_eq!(t.get(Face::Left), 1);
        assert_eq!(t.get(Face::Back), 1);
        assert_eq!(t.get(Face::Bottom), 2);
    }
}
