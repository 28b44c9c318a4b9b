//! Hex board geometry with offset coordinates
//!
//! Hexes are flat-topped and addressed by (column, row). Odd columns sit half
//! a hex lower than even ones, so the row delta of each diagonal heading
//! depends on the parity of the starting column.
//!
//! Headings are degrees clockwise from north. The six edge headings
//! (multiples of 60) point at neighbors; the six vertex headings (30 off an
//! edge) point along hex-sides shared by two neighbors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Heading or facing in degrees, normalized to `0..360`
pub type Angle = u16;

/// Headings toward the six neighbors
pub const EDGE_ANGLES: [Angle; 6] = [0, 60, 120, 180, 240, 300];

/// Headings toward the six vertices
pub const VERTEX_ANGLES: [Angle; 6] = [30, 90, 150, 210, 270, 330];

/// Every facing a unit may take
pub const FACINGS: [Angle; 12] = [0, 30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330];

/// Neighbor offsets (dcol, drow) indexed by column parity, then by edge heading / 60
const NEIGHBOR_OFFSETS: [[(i32, i32); 6]; 2] = [
    // even columns
    [(0, -1), (1, -1), (1, 0), (0, 1), (-1, 0), (-1, -1)],
    // odd columns
    [(0, -1), (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0)],
];

// ============================================================================
// ANGLE HELPERS
// ============================================================================

/// Wrap any signed angle into `0..360`
pub fn normalize(angle: i32) -> Angle {
    angle.rem_euclid(360) as Angle
}

/// Turn an angle by a signed delta
pub fn rotate(angle: Angle, delta: i32) -> Angle {
    normalize(angle as i32 + delta)
}

/// Opposite heading
pub fn invert(angle: Angle) -> Angle {
    rotate(angle, 180)
}

/// True when the angle points at a neighbor rather than a vertex
pub fn is_edge_angle(angle: Angle) -> bool {
    angle % 60 == 0
}

/// Smallest unsigned difference between two headings (`0..=180`)
pub fn angle_diff(a: Angle, b: Angle) -> u16 {
    let diff = (a as i32 - b as i32).rem_euclid(360) as u16;
    diff.min(360 - diff)
}

fn edge_index(angle: Angle) -> usize {
    assert!(
        is_edge_angle(angle) && angle < 360,
        "heading {angle} does not point at a neighbor"
    );
    (angle / 60) as usize
}

// ============================================================================
// HEX
// ============================================================================

/// One cell of the battlefield grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HexRef {
    pub col: i32,
    pub row: i32,
}

impl HexRef {
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    fn parity(&self) -> usize {
        (self.col & 1) as usize
    }

    /// Neighbor across the edge at `angle` (a multiple of 60)
    pub fn neighbor(&self, angle: Angle) -> HexRef {
        let (dc, dr) = NEIGHBOR_OFFSETS[self.parity()][edge_index(angle)];
        HexRef::new(self.col + dc, self.row + dr)
    }

    /// All six neighbors with the heading that reaches each
    pub fn neighbors(&self) -> [(Angle, HexRef); 6] {
        EDGE_ANGLES.map(|angle| (angle, self.neighbor(angle)))
    }

    /// Heading toward `other` if the two hexes share an edge
    pub fn is_adjacent(&self, other: HexRef) -> Option<Angle> {
        EDGE_ANGLES
            .iter()
            .copied()
            .find(|&angle| self.neighbor(angle) == other)
    }

    /// Hex-side between this hex and its neighbor at `angle`
    pub fn side_to(&self, angle: Angle) -> HexSideRef {
        HexSideRef {
            from: *self,
            to: self.neighbor(angle),
        }
    }

    /// Corner at a vertex heading (30 off an edge)
    pub fn vertex(&self, angle: Angle) -> HexVertexRef {
        assert!(!is_edge_angle(angle), "heading {angle} does not point at a vertex");
        HexVertexRef {
            hexes: [
                *self,
                self.neighbor(rotate(angle, -30)),
                self.neighbor(rotate(angle, 30)),
            ],
        }
    }

    /// Cube coordinates (x + y + z == 0)
    pub fn to_cube(&self) -> (i32, i32, i32) {
        let x = self.col;
        let z = self.row - (self.col - (self.col & 1)) / 2;
        (x, -x - z, z)
    }

    /// Distance in hex steps
    pub fn distance_to(&self, other: HexRef) -> u32 {
        let (x1, y1, z1) = self.to_cube();
        let (x2, y2, z2) = other.to_cube();
        (x1 - x2).abs().max((y1 - y2).abs()).max((z1 - z2).abs()) as u32
    }
}

impl fmt::Display for HexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

// ============================================================================
// HEX-SIDES AND VERTICES
// ============================================================================

/// Edge between two adjacent hexes, as an ordered pair
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexSideRef {
    pub from: HexRef,
    pub to: HexRef,
}

impl HexSideRef {
    pub fn new(from: HexRef, to: HexRef) -> Self {
        assert!(
            from.is_adjacent(to).is_some(),
            "{from} and {to} do not share a side"
        );
        Self { from, to }
    }

    /// Heading from the first hex to the second
    pub fn angle(&self) -> Angle {
        self.from
            .is_adjacent(self.to)
            .unwrap_or_else(|| panic!("{} and {} do not share a side", self.from, self.to))
    }

    pub fn hexes(&self) -> [HexRef; 2] {
        [self.from, self.to]
    }

    pub fn contains(&self, hex: HexRef) -> bool {
        self.from == hex || self.to == hex
    }

    /// The other end of the side
    pub fn other(&self, hex: HexRef) -> HexRef {
        if hex == self.from {
            self.to
        } else {
            self.from
        }
    }

    /// Endpoint lying toward `angle`: the second hex when the side heading is
    /// strictly within 90 degrees of `angle`, the first hex otherwise
    pub fn face_hex(&self, angle: Angle) -> HexRef {
        if angle_diff(self.angle(), angle) < 90 {
            self.to
        } else {
            self.from
        }
    }
}

impl fmt::Display for HexSideRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Corner shared by three mutually adjacent hexes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HexVertexRef {
    pub hexes: [HexRef; 3],
}

impl HexVertexRef {
    pub fn new(a: HexRef, b: HexRef, c: HexRef) -> Self {
        assert!(
            a.is_adjacent(b).is_some() && b.is_adjacent(c).is_some() && a.is_adjacent(c).is_some(),
            "{a}, {b} and {c} do not meet at a vertex"
        );
        Self { hexes: [a, b, c] }
    }

    pub fn contains(&self, hex: HexRef) -> bool {
        self.hexes.contains(&hex)
    }
}

/// Endpoint of `side` that lies toward `angle`
pub fn face_hex_of_side(side: &HexSideRef, angle: Angle) -> HexRef {
    side.face_hex(angle)
}

// ============================================================================
// PIXEL GEOMETRY
// ============================================================================

/// Pixel location
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fixed grid dimensions of a map
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    pub hex_width: f64,
    pub hex_height: f64,
    pub margin_x: f64,
    pub margin_y: f64,
    pub col_count: i32,
    pub row_count: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::regular(120.0, 12, 16)
    }
}

impl Geometry {
    /// Regular flat-top hexes of the given width
    pub fn regular(hex_width: f64, col_count: i32, row_count: i32) -> Self {
        Self {
            hex_width,
            hex_height: hex_width * 3f64.sqrt() / 2.0,
            margin_x: 0.0,
            margin_y: 0.0,
            col_count,
            row_count,
        }
    }

    /// Check if a hex lies within the declared grid
    pub fn contains(&self, hex: HexRef) -> bool {
        hex.col >= 0 && hex.row >= 0 && hex.col < self.col_count && hex.row < self.row_count
    }

    /// Pixel center of a hex
    pub fn center(&self, hex: HexRef) -> Point {
        let shift = if hex.col & 1 == 1 { self.hex_height / 2.0 } else { 0.0 };
        Point::new(
            self.margin_x + self.hex_width / 2.0 + hex.col as f64 * self.hex_width * 0.75,
            self.margin_y + self.hex_height / 2.0 + hex.row as f64 * self.hex_height + shift,
        )
    }

    pub fn location<L: Located + ?Sized>(&self, target: &L) -> Point {
        target.location(self)
    }

    /// Bearing in degrees from one location to another
    pub fn angle_between<A, B>(&self, from: &A, to: &B) -> f64
    where
        A: Located + ?Sized,
        B: Located + ?Sized,
    {
        let a = from.location(self);
        let b = to.location(self);
        let bearing = (b.x - a.x).atan2(a.y - b.y).to_degrees();
        if bearing < 0.0 {
            bearing + 360.0
        } else {
            bearing
        }
    }
}

/// Anything with a pixel location on the map
pub trait Located {
    fn location(&self, geometry: &Geometry) -> Point;
}

impl Located for HexRef {
    fn location(&self, geometry: &Geometry) -> Point {
        geometry.center(*self)
    }
}

impl Located for HexSideRef {
    fn location(&self, geometry: &Geometry) -> Point {
        let a = geometry.center(self.from);
        let b = geometry.center(self.to);
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }
}

impl Located for HexVertexRef {
    fn location(&self, geometry: &Geometry) -> Point {
        let [a, b, c] = self.hexes.map(|hex| geometry.center(hex));
        Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
    }
}
