use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Physical seat category. Drives the fixed price table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SeatType {
    Seater,
    SemiSleeper,
    Sleeper,
}

/// Which side of the aisle a seat sits on. Derived from the layout's
/// aisle index, never stored independently of the column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Left,
    Right,
}

/// Grid shape of a coach: seats left of the aisle "-" seats right of it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LayoutKind {
    #[serde(rename = "1-1")]
    OneByOne,
    #[serde(rename = "2-1")]
    TwoByOne,
    #[serde(rename = "2-2")]
    TwoByTwo,
    #[serde(rename = "2-3")]
    TwoByThree,
}

impl LayoutKind {
    pub fn seats_per_row(&self) -> usize {
        match self {
            LayoutKind::OneByOne => 2,
            LayoutKind::TwoByOne => 3,
            LayoutKind::TwoByTwo => 4,
            LayoutKind::TwoByThree => 5,
        }
    }

    /// Number of seats left of the aisle; columns `0..aisle_after()` are
    /// the left block.
    pub fn aisle_after(&self) -> usize {
        match self {
            LayoutKind::OneByOne => 1,
            LayoutKind::TwoByOne => 2,
            LayoutKind::TwoByTwo => 2,
            LayoutKind::TwoByThree => 2,
        }
    }
}

/// Position-derived seat identity. Stable only while the seat stays at
/// its (row, column); structural edits reassign ids during renumbering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SeatId(pub String);

impl SeatId {
    /// Ids are 1-based "row-column", e.g. "3-2".
    pub fn from_position(row: usize, column: usize) -> Self {
        SeatId(format!("{}-{}", row + 1, column + 1))
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SeatId {
    fn from(value: &str) -> Self {
        SeatId(value.to_string())
    }
}

/// A single seat in the grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Seat {
    pub id: SeatId,
    /// Dense zero-padded label ("01".."NN"), recomputed on every
    /// structural change, ordered by (row, column).
    pub seat_number: String,
    pub row: u32,
    pub column: u32,
    pub seat_type: SeatType,
    pub price: i32,
    pub side: Side,
}

/// A coach and its seat grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: Uuid,
    pub name: String,
    pub number: String,
    pub layout: LayoutKind,
    pub rows: Vec<Vec<Seat>>,
}

impl Bus {
    pub fn seat_universe(&self) -> BTreeSet<SeatId> {
        self.rows
            .iter()
            .flatten()
            .map(|seat| seat.id.clone())
            .collect()
    }

    pub fn find_seat(&self, id: &SeatId) -> Option<&Seat> {
        self.rows.iter().flatten().find(|seat| &seat.id == id)
    }

    pub fn seat_count(&self) -> usize {
        self.rows.iter().map(|row| row.len()).sum()
    }
}
