use std::collections::{HashMap, HashSet};

use tracing::warn;
use ultraviolet::DVec2;

use crate::body::{Body, BodyId, Cell, NO_CELL};

/// Side length of one bucket in world units.
pub const CELL_SIZE: f64 = 128.0;

/// Largest row/column index; coordinates beyond it share the last bucket.
pub const MAX_INDEX: i32 = 1023;

/// Sparse uniform grid of collision buckets.
///
/// Buckets hold body slots (indices into the owner's body list) and are
/// created on first use. Each body records the cell it is registered in,
/// which must always equal the cell computed from its position.
///
/// The grid also carries the per-frame ignore relation used to keep an
/// equal-mass pair from being resolved twice in one frame.
#[derive(Debug, Default)]
pub struct CollisionBuckets {
    /// Keyed by (row, col).
    buckets: HashMap<(i32, i32), Vec<usize>>,
    ignored: HashSet<(BodyId, BodyId)>,
}

impl CollisionBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket index for one coordinate. Negative coordinates collapse to 0.
    #[inline]
    pub fn index_from_coord(v: f64) -> i32 {
        let index = (v.max(0.0) / CELL_SIZE).floor() as i64;
        index.min(i64::from(MAX_INDEX)) as i32
    }

    /// Cell (column, row) for a position.
    #[inline]
    pub fn cell_for(pos: DVec2) -> Cell {
        (Self::index_from_coord(pos.x), Self::index_from_coord(pos.y))
    }

    /// Returns the bucket at the clamped (row, col), creating it if absent.
    pub fn bucket_at(&mut self, row: i32, col: i32) -> &mut Vec<usize> {
        let key = (row.clamp(0, MAX_INDEX), col.clamp(0, MAX_INDEX));
        self.buckets.entry(key).or_default()
    }

    /// Bucket at (row, col) if it has ever been created.
    pub fn bucket(&self, row: i32, col: i32) -> Option<&[usize]> {
        self.buckets
            .get(&(row.clamp(0, MAX_INDEX), col.clamp(0, MAX_INDEX)))
            .map(Vec::as_slice)
    }

    /// Registers `body` (living at `slot`) in the bucket under its position.
    pub fn insert(&mut self, slot: usize, body: &mut Body) {
        debug_assert!(!body.is_inserted(), "body {} inserted twice", body.id);
        if body.is_inserted() {
            warn!(body = %body.id, cell = ?body.cell, "insert of registered body, moving instead");
            self.move_body(slot, body);
            return;
        }

        let (col, row) = Self::cell_for(body.pos);
        let bucket = self.bucket_at(row, col);
        debug_assert!(!bucket.contains(&slot), "slot {slot} already in bucket");
        bucket.push(slot);
        body.cell = (col, row);
    }

    /// Unregisters `body` from its recorded bucket.
    pub fn remove(&mut self, slot: usize, body: &mut Body) {
        debug_assert!(body.is_inserted(), "removing body {} that is not inserted", body.id);
        if !body.is_inserted() {
            warn!(body = %body.id, "remove of unregistered body ignored");
            return;
        }

        let (col, row) = body.cell;
        if !self.take_from(row, col, slot) {
            debug_assert!(false, "body {} missing from bucket ({row}, {col})", body.id);
            warn!(body = %body.id, row, col, "body missing from its bucket, purging slot");
            self.purge_slot(slot);
        }
        body.cell = NO_CELL;
    }

    /// Re-buckets `body` after its position changed. No-op if the cell is unchanged.
    pub fn move_body(&mut self, slot: usize, body: &mut Body) {
        if !body.is_inserted() {
            warn!(body = %body.id, "move of unregistered body, inserting");
            self.insert(slot, body);
            return;
        }

        let new_cell = Self::cell_for(body.pos);
        if new_cell == body.cell {
            return;
        }

        let (old_col, old_row) = body.cell;
        if !self.take_from(old_row, old_col, slot) {
            debug_assert!(false, "body {} missing from bucket ({old_row}, {old_col})", body.id);
            warn!(body = %body.id, "body missing from its bucket, purging slot");
            self.purge_slot(slot);
        }

        let (col, row) = new_cell;
        self.bucket_at(row, col).push(slot);
        body.cell = new_cell;
    }

    /// Swap-with-last removal of `slot` from one bucket.
    fn take_from(&mut self, row: i32, col: i32, slot: usize) -> bool {
        let Some(bucket) = self.buckets.get_mut(&(row, col)) else {
            return false;
        };
        match bucket.iter().position(|&s| s == slot) {
            Some(index) => {
                bucket.swap_remove(index);
                true
            }
            None => false,
        }
    }

    fn purge_slot(&mut self, slot: usize) {
        for bucket in self.buckets.values_mut() {
            bucket.retain(|&s| s != slot);
        }
    }

    /// Non-empty buckets overlapping the square of half-size `radius` around
    /// (x, y), widened by one bucket on every side.
    pub fn near(&self, x: f64, y: f64, radius: f64) -> Vec<&[usize]> {
        let top = (Self::index_from_coord(y - radius) - 1).max(0);
        let bottom = (Self::index_from_coord(y + radius) + 1).min(MAX_INDEX);
        let left = (Self::index_from_coord(x - radius) - 1).max(0);
        let right = (Self::index_from_coord(x + radius) + 1).min(MAX_INDEX);

        let mut result = Vec::new();
        for row in top..=bottom {
            for col in left..=right {
                if let Some(bucket) = self.buckets.get(&(row, col)) {
                    if !bucket.is_empty() {
                        result.push(bucket.as_slice());
                    }
                }
            }
        }
        result
    }

    /// Forgets the ignore relation of the previous frame.
    pub fn new_frame(&mut self) {
        self.ignored.clear();
    }

    /// Suppresses the pair for the rest of the frame.
    pub fn ignore(&mut self, from: BodyId, to: BodyId) {
        self.ignored.insert(pair_key(from, to));
    }

    pub fn should_ignore(&self, from: BodyId, to: BodyId) -> bool {
        self.ignored.contains(&pair_key(from, to))
    }

    /// Total number of registrations across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every bucket and the ignore relation. Does not touch bodies.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.ignored.clear();
    }

    /// Checks that every inserted body sits in exactly one bucket matching its
    /// position, and that buckets only reference live slots.
    pub fn validate(&self, bodies: &[Body]) -> bool {
        let mut seen = vec![0u32; bodies.len()];
        let mut ok = true;

        for (&(row, col), bucket) in &self.buckets {
            for &slot in bucket {
                let Some(body) = bodies.get(slot) else {
                    warn!(slot, row, col, "bucket references dead slot");
                    ok = false;
                    continue;
                };
                seen[slot] += 1;
                if body.cell != (col, row) || Self::cell_for(body.pos) != body.cell {
                    warn!(body = %body.id, cell = ?body.cell, row, col, "bucket mismatch");
                    ok = false;
                }
            }
        }

        for (body, &count) in bodies.iter().zip(&seen) {
            if count != 1 || !body.is_inserted() {
                warn!(body = %body.id, count, "body not registered exactly once");
                ok = false;
            }
        }
        ok
    }
}

#[inline]
fn pair_key(a: BodyId, b: BodyId) -> (BodyId, BodyId) {
    if a <= b { (a, b) } else { (b, a) }
}
