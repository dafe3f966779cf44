// topology.rs — Coordinate-keyed index of a device's declared structure
//
// One read-only scan over the device body. Every entity owned by a tile
// (core, memory module, switchbox, buffers, locks) names that tile as its
// first operand; the index keys all of them by the tile's (col, row).
//
// Preconditions: `device` is a live `aie.device` operation.
// Postconditions: lookups never fail; a missing entry is an empty result.
// Failure modes: none. Duplicate coordinates are recorded, not rejected.
// Side effects: none.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::id::{OpId, ValueId};
use crate::ir::{Module, OpKind};

/// Tile position in the 2-D array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub col: i32,
    pub row: i32,
}

impl TileCoord {
    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// Coordinates of the tile defining `tile`, if it is an `aie.tile` result.
pub fn tile_coord(module: &Module, tile: ValueId) -> Option<TileCoord> {
    let def = module.defining_op(tile)?;
    if !module.is_live(def) {
        return None;
    }
    match module.kind(def) {
        OpKind::Tile { col, row } => Some(TileCoord::new(*col, *row)),
        _ => None,
    }
}

/// Coordinates of the tile an owned entity (core, buffer, lock, ...) names
/// as its first operand.
pub fn owner_coord(module: &Module, op: OpId) -> Option<TileCoord> {
    let tile = *module.op(op).operands.first()?;
    tile_coord(module, tile)
}

#[derive(Debug, Clone, Default)]
pub struct TopologyIndex {
    tiles: BTreeMap<TileCoord, OpId>,
    cores: HashMap<TileCoord, OpId>,
    mems: HashMap<TileCoord, OpId>,
    switchboxes: HashMap<TileCoord, OpId>,
    buffers: HashMap<TileCoord, Vec<OpId>>,
    locks: HashMap<TileCoord, Vec<OpId>>,
    duplicates: Vec<TileCoord>,
}

impl TopologyIndex {
    pub fn build(module: &Module, device: OpId) -> Self {
        let mut index = TopologyIndex::default();
        for op in module.walk_nested(device) {
            match module.kind(op) {
                OpKind::Tile { col, row } => {
                    let coord = TileCoord::new(*col, *row);
                    if index.tiles.insert(coord, op).is_some() {
                        index.duplicates.push(coord);
                    }
                }
                OpKind::Core => index.insert_unique(module, op, |i| &mut i.cores),
                OpKind::Mem => index.insert_unique(module, op, |i| &mut i.mems),
                OpKind::Switchbox => index.insert_unique(module, op, |i| &mut i.switchboxes),
                OpKind::Buffer { .. } => {
                    if let Some(coord) = owner_coord(module, op) {
                        index.buffers.entry(coord).or_default().push(op);
                    }
                }
                OpKind::Lock { .. } => {
                    if let Some(coord) = owner_coord(module, op) {
                        index.locks.entry(coord).or_default().push(op);
                    }
                }
                _ => {}
            }
        }
        index
    }

    fn insert_unique<F>(&mut self, module: &Module, op: OpId, table: F)
    where
        F: FnOnce(&mut Self) -> &mut HashMap<TileCoord, OpId>,
    {
        if let Some(coord) = owner_coord(module, op) {
            table(self).entry(coord).or_insert(op);
        }
    }

    pub fn tile(&self, coord: TileCoord) -> Option<OpId> {
        self.tiles.get(&coord).copied()
    }

    /// All tiles in (col, row) order.
    pub fn tiles(&self) -> impl Iterator<Item = (TileCoord, OpId)> + '_ {
        self.tiles.iter().map(|(&c, &op)| (c, op))
    }

    pub fn core(&self, coord: TileCoord) -> Option<OpId> {
        self.cores.get(&coord).copied()
    }

    /// All cores in (col, row) order.
    pub fn cores(&self) -> Vec<(TileCoord, OpId)> {
        let mut cores: Vec<_> = self.cores.iter().map(|(&c, &op)| (c, op)).collect();
        cores.sort();
        cores
    }

    pub fn mem(&self, coord: TileCoord) -> Option<OpId> {
        self.mems.get(&coord).copied()
    }

    pub fn switchbox(&self, coord: TileCoord) -> Option<OpId> {
        self.switchboxes.get(&coord).copied()
    }

    pub fn buffers(&self, coord: TileCoord) -> &[OpId] {
        self.buffers.get(&coord).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn locks(&self, coord: TileCoord) -> &[OpId] {
        self.locks.get(&coord).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The lock with identifier `id` on the tile at `coord`.
    pub fn lock(&self, module: &Module, coord: TileCoord, id: i32) -> Option<OpId> {
        self.locks(coord)
            .iter()
            .copied()
            .find(|&op| matches!(module.kind(op), OpKind::Lock { id: lock_id, .. } if *lock_id == id))
    }

    /// Coordinates declared by more than one tile.
    pub fn duplicates(&self) -> &[TileCoord] {
        &self.duplicates
    }
}
