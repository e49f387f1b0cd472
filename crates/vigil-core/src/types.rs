use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Position in the change log. Assigned by the store, strictly increasing in
/// commit order. Gaps are permitted; non-monotonicity is not.
pub type Seq = i64;

/// The kind of a row mutation, encoded as a bitmask bit so subscribers can
/// select any subset of kinds with a single mask.
///
/// A value read from the change log is always a single bit; masks built with
/// `|` may combine several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeKind(u8);

impl ChangeKind {
    pub const CREATE: ChangeKind = ChangeKind(1);
    pub const UPDATE: ChangeKind = ChangeKind(2);
    pub const DELETE: ChangeKind = ChangeKind(4);

    /// Mask matching every kind.
    pub const ALL: ChangeKind = ChangeKind(1 | 2 | 4);

    /// Reconstruct a kind (or mask) from its stored integer encoding.
    ///
    /// Returns `None` for zero or for bits outside the known set.
    pub fn from_bits(bits: i64) -> Option<ChangeKind> {
        if bits == 0 || bits & !(Self::ALL.0 as i64) != 0 {
            return None;
        }
        Some(ChangeKind(bits as u8))
    }

    /// The raw bit encoding, as written to the change log.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if this kind shares at least one bit with `mask`.
    pub fn intersects(self, mask: ChangeKind) -> bool {
        self.0 & mask.0 != 0
    }
}

impl BitOr for ChangeKind {
    type Output = ChangeKind;

    fn bitor(self, rhs: ChangeKind) -> ChangeKind {
        ChangeKind(self.0 | rhs.0)
    }
}

impl BitOrAssign for ChangeKind {
    fn bitor_assign(&mut self, rhs: ChangeKind) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ChangeKind {
    type Output = ChangeKind;

    fn bitand(self, rhs: ChangeKind) -> ChangeKind {
        ChangeKind(self.0 & rhs.0)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intersects(Self::CREATE) {
            write!(f, "c")?;
        }
        if self.intersects(Self::UPDATE) {
            write!(f, "u")?;
        }
        if self.intersects(Self::DELETE) {
            write!(f, "d")?;
        }
        Ok(())
    }
}

/// One logical row mutation, as observed in the change log.
///
/// `Change` is a flat record; every receiving subscription gets its own copy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    /// Change-log position; total order across all entities.
    pub seq: Seq,
    /// What happened to the row. Always a single bit on the wire.
    pub kind: ChangeKind,
    /// The logical table the row lives in, e.g. `"model_config"`.
    pub entity_type: String,
    /// Primary key of the mutated row.
    pub entity_id: i64,
    /// Timestamp recorded by the change-log trigger. Carried opaque; the
    /// pipeline never interprets it.
    pub created_at: String,
}
