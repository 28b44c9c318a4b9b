//! Battlefield map: a sparse cache of hex cells
//!
//! The map is the only owner of cells. Cells hold unit identifiers, never
//! units; the game roster resolves them.

use crate::board::{Angle, Geometry, HexRef, Located, Point};
use crate::unit::UnitId;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Ground type of a hex
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Clear,
    Rough,
    Difficult,
    Impassable,
}

impl Terrain {
    /// Base movement cost to enter, `None` when the hex cannot be entered
    pub fn move_cost(self) -> Option<f32> {
        match self {
            Terrain::Clear => Some(1.0),
            Terrain::Rough => Some(1.5),
            Terrain::Difficult => Some(2.0),
            Terrain::Impassable => None,
        }
    }
}

/// Ambient weather, fed by the weather collaborator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weather {
    #[default]
    Clear,
    Hot,
    Cloudy,
    Rain,
    Storm,
}

/// A unit standing in a cell
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    pub unit: UnitId,
    pub character: bool,
}

/// Mutable backing store of one hex
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HexCell {
    occupants: Vec<Occupant>,
    terrain: Terrain,
}

impl HexCell {
    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.occupants.iter().map(|o| o.unit)
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.occupants.iter().any(|o| o.unit == unit)
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn terrain(&self) -> Terrain {
        self.terrain
    }

    /// Stack a unit; troops go below every character already present
    pub(crate) fn append(&mut self, unit: UnitId, character: bool) {
        let occupant = Occupant { unit, character };
        if character {
            self.occupants.push(occupant);
        } else {
            let index = self
                .occupants
                .iter()
                .position(|o| o.character)
                .unwrap_or(self.occupants.len());
            self.occupants.insert(index, occupant);
        }
    }

    pub(crate) fn remove(&mut self, unit: UnitId) -> bool {
        let before = self.occupants.len();
        self.occupants.retain(|o| o.unit != unit);
        self.occupants.len() != before
    }
}

/// Lazily populated grid of cells
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    geometry: Geometry,
    cells: FxHashMap<HexRef, HexCell>,
}

impl Map {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            cells: FxHashMap::default(),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn hex(&self, col: i32, row: i32) -> HexRef {
        HexRef::new(col, row)
    }

    /// Cell if it has been created
    pub fn cell(&self, hex: HexRef) -> Option<&HexCell> {
        self.cells.get(&hex)
    }

    /// Cell, created on demand (the grid is unbounded at this layer)
    pub(crate) fn cell_mut(&mut self, hex: HexRef) -> &mut HexCell {
        self.cells.entry(hex).or_default()
    }

    /// Put back a captured cell, or drop it when it did not exist
    pub(crate) fn replace_cell(&mut self, hex: HexRef, cell: Option<HexCell>) {
        match cell {
            Some(cell) => {
                self.cells.insert(hex, cell);
            }
            None => {
                self.cells.remove(&hex);
            }
        }
    }

    pub fn occupants(&self, hex: HexRef) -> &[Occupant] {
        self.cells.get(&hex).map_or(&[], |cell| cell.occupants())
    }

    pub fn units_at(&self, hex: HexRef) -> Vec<UnitId> {
        self.occupants(hex).iter().map(|o| o.unit).collect()
    }

    pub fn terrain(&self, hex: HexRef) -> Terrain {
        self.cells.get(&hex).map_or(Terrain::Clear, |cell| cell.terrain)
    }

    /// Set up ground; not undo-logged, terrain is fixed once play starts
    pub fn set_terrain(&mut self, hex: HexRef, terrain: Terrain) {
        self.cell_mut(hex).terrain = terrain;
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn location<L: Located + ?Sized>(&self, target: &L) -> Point {
        self.geometry.location(target)
    }

    pub fn angle_between<A, B>(&self, from: &A, to: &B) -> f64
    where
        A: Located + ?Sized,
        B: Located + ?Sized,
    {
        self.geometry.angle_between(from, to)
    }

    /// Neighbor of `hex`, creating its cell when missing
    pub fn neighbor_cell(&mut self, hex: HexRef, angle: Angle) -> (HexRef, &HexCell) {
        let neighbor = hex.neighbor(angle);
        (neighbor, self.cell_mut(neighbor))
    }
}
