use crate::pricing::SeatPriceTable;
use transita_shared::models::{Bus, LayoutKind, Seat, SeatId, SeatType, Side};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid layout parameters: {0}")]
    Validation(String),

    #[error("seat position out of bounds: row {row}, column {column}")]
    OutOfBounds { row: usize, column: usize },
}

/// One reversible structural edit. Each entry carries exactly the data
/// needed to re-apply or invert it, so the history is a command log
/// rather than a full snapshot per edit.
#[derive(Debug, Clone)]
enum Command {
    Generate {
        prev_rows: Vec<Vec<Seat>>,
        prev_layout: LayoutKind,
        prev_seat_type: SeatType,
        rows: Vec<Vec<Seat>>,
        layout: LayoutKind,
        seat_type: SeatType,
    },
    AddRow {
        row: Vec<Seat>,
    },
    RemoveRow {
        index: usize,
        row: Vec<Seat>,
    },
    RemoveSeat {
        row: usize,
        column: usize,
        seat: Seat,
    },
    UpdateSeatType {
        row: usize,
        column: usize,
        prev: SeatType,
        next: SeatType,
    },
    ReorderSeat {
        row: usize,
        from: usize,
        to: usize,
    },
    ReorderRow {
        from: usize,
        to: usize,
    },
}

/// Builds and edits a coach's seat grid with linear undo/redo history.
///
/// Seat numbers are dense, zero-padded and ordered by (row, column);
/// ids are position-derived. Both are recomputed after every structural
/// change, including undo and redo.
pub struct SeatLayoutBuilder {
    rows: Vec<Vec<Seat>>,
    layout: LayoutKind,
    seat_type: SeatType,
    prices: SeatPriceTable,
    log: Vec<Command>,
    /// Commands `[0, cursor)` are applied; `[cursor, len)` is the redo tail.
    cursor: usize,
}

impl SeatLayoutBuilder {
    pub fn new() -> Self {
        Self::with_prices(SeatPriceTable::default())
    }

    pub fn with_prices(prices: SeatPriceTable) -> Self {
        Self {
            rows: Vec::new(),
            layout: LayoutKind::TwoByTwo,
            seat_type: SeatType::Seater,
            prices,
            log: Vec::new(),
            cursor: 0,
        }
    }

    pub fn rows(&self) -> &[Vec<Seat>] {
        &self.rows
    }

    pub fn seat(&self, row: usize, column: usize) -> Option<&Seat> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn seat_count(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Deterministically builds `row_count` rows of the given layout,
    /// replacing any existing grid. The replaced grid stays reachable
    /// through undo.
    pub fn generate_layout(
        &mut self,
        row_count: usize,
        layout: LayoutKind,
        seat_type: SeatType,
    ) -> Result<(), LayoutError> {
        if row_count == 0 {
            return Err(LayoutError::Validation(
                "row count must be greater than zero".to_string(),
            ));
        }

        let rows = (0..row_count)
            .map(|_| self.blank_row(layout, seat_type))
            .collect();
        self.record(Command::Generate {
            prev_rows: self.rows.clone(),
            prev_layout: self.layout,
            prev_seat_type: self.seat_type,
            rows,
            layout,
            seat_type,
        });
        Ok(())
    }

    /// Appends a row using the current layout and default seat type.
    pub fn add_row(&mut self) {
        let row = self.blank_row(self.layout, self.seat_type);
        self.record(Command::AddRow { row });
    }

    pub fn remove_row(&mut self, index: usize) -> Result<(), LayoutError> {
        if index >= self.rows.len() {
            return Err(LayoutError::OutOfBounds {
                row: index,
                column: 0,
            });
        }
        let row = self.rows[index].clone();
        self.record(Command::RemoveRow { index, row });
        Ok(())
    }

    pub fn remove_seat(&mut self, row: usize, column: usize) -> Result<(), LayoutError> {
        let seat = self
            .seat(row, column)
            .cloned()
            .ok_or(LayoutError::OutOfBounds { row, column })?;
        self.record(Command::RemoveSeat { row, column, seat });
        Ok(())
    }

    /// Changes a seat's type; the price is recomputed from the fixed table.
    pub fn update_seat_type(
        &mut self,
        row: usize,
        column: usize,
        seat_type: SeatType,
    ) -> Result<(), LayoutError> {
        let prev = self
            .seat(row, column)
            .map(|s| s.seat_type)
            .ok_or(LayoutError::OutOfBounds { row, column })?;
        if prev == seat_type {
            return Ok(());
        }
        self.record(Command::UpdateSeatType {
            row,
            column,
            prev,
            next: seat_type,
        });
        Ok(())
    }

    /// Moves a seat within its row. Moves that would cross the aisle
    /// are rejected as no-ops: seats reorder only within their own side.
    /// Returns whether the move was applied.
    pub fn reorder_seat_within_row(
        &mut self,
        row: usize,
        from: usize,
        to: usize,
    ) -> Result<bool, LayoutError> {
        let width = self
            .rows
            .get(row)
            .map(|r| r.len())
            .ok_or(LayoutError::OutOfBounds { row, column: from })?;
        if from >= width || to >= width {
            return Err(LayoutError::OutOfBounds {
                row,
                column: from.max(to),
            });
        }
        if from == to {
            return Ok(false);
        }
        let aisle = self.layout.aisle_after();
        if (from < aisle) != (to < aisle) {
            return Ok(false);
        }
        self.record(Command::ReorderSeat { row, from, to });
        Ok(true)
    }

    /// Moves an entire row. Returns whether the move was applied.
    pub fn reorder_row(&mut self, from: usize, to: usize) -> Result<bool, LayoutError> {
        if from >= self.rows.len() || to >= self.rows.len() {
            return Err(LayoutError::OutOfBounds {
                row: from.max(to),
                column: 0,
            });
        }
        if from == to {
            return Ok(false);
        }
        self.record(Command::ReorderRow { from, to });
        Ok(true)
    }

    /// Steps the cursor back one edit. No-op at the history start.
    pub fn undo(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let cmd = self.log[self.cursor].clone();
        self.invert(&cmd);
        self.renumber();
        true
    }

    /// Re-applies the next edit. No-op at the history tail.
    pub fn redo(&mut self) -> bool {
        if self.cursor == self.log.len() {
            return false;
        }
        let cmd = self.log[self.cursor].clone();
        self.cursor += 1;
        self.apply(&cmd);
        self.renumber();
        true
    }

    /// Freezes the current grid into a bus record.
    pub fn into_bus(&self, name: impl Into<String>, number: impl Into<String>) -> Bus {
        Bus {
            id: Uuid::new_v4(),
            name: name.into(),
            number: number.into(),
            layout: self.layout,
            rows: self.rows.clone(),
        }
    }

    fn blank_row(&self, layout: LayoutKind, seat_type: SeatType) -> Vec<Seat> {
        (0..layout.seats_per_row())
            .map(|_| Seat {
                id: SeatId::from_position(0, 0),
                seat_number: String::new(),
                row: 0,
                column: 0,
                seat_type,
                price: self.prices.price(seat_type),
                side: Side::Left,
            })
            .collect()
    }

    /// Applies a new mutation: truncates the redo tail, applies, logs,
    /// renumbers.
    fn record(&mut self, cmd: Command) {
        self.log.truncate(self.cursor);
        self.apply(&cmd);
        self.log.push(cmd);
        self.cursor += 1;
        self.renumber();
    }

    fn apply(&mut self, cmd: &Command) {
        match cmd {
            Command::Generate {
                rows,
                layout,
                seat_type,
                ..
            } => {
                self.rows = rows.clone();
                self.layout = *layout;
                self.seat_type = *seat_type;
            }
            Command::AddRow { row } => self.rows.push(row.clone()),
            Command::RemoveRow { index, .. } => {
                self.rows.remove(*index);
            }
            Command::RemoveSeat { row, column, .. } => {
                self.rows[*row].remove(*column);
            }
            Command::UpdateSeatType {
                row, column, next, ..
            } => {
                let seat = &mut self.rows[*row][*column];
                seat.seat_type = *next;
                seat.price = self.prices.price(*next);
            }
            Command::ReorderSeat { row, from, to } => {
                let seat = self.rows[*row].remove(*from);
                self.rows[*row].insert(*to, seat);
            }
            Command::ReorderRow { from, to } => {
                let row = self.rows.remove(*from);
                self.rows.insert(*to, row);
            }
        }
    }

    fn invert(&mut self, cmd: &Command) {
        match cmd {
            Command::Generate {
                prev_rows,
                prev_layout,
                prev_seat_type,
                ..
            } => {
                self.rows = prev_rows.clone();
                self.layout = *prev_layout;
                self.seat_type = *prev_seat_type;
            }
            Command::AddRow { .. } => {
                self.rows.pop();
            }
            Command::RemoveRow { index, row } => self.rows.insert(*index, row.clone()),
            Command::RemoveSeat { row, column, seat } => {
                self.rows[*row].insert(*column, seat.clone())
            }
            Command::UpdateSeatType {
                row, column, prev, ..
            } => {
                let seat = &mut self.rows[*row][*column];
                seat.seat_type = *prev;
                seat.price = self.prices.price(*prev);
            }
            Command::ReorderSeat { row, from, to } => {
                let seat = self.rows[*row].remove(*to);
                self.rows[*row].insert(*from, seat);
            }
            Command::ReorderRow { from, to } => {
                let row = self.rows.remove(*to);
                self.rows.insert(*from, row);
            }
        }
    }

    /// Reassigns ids, seat numbers and sides after any structural change.
    /// Numbers stay contiguous 1..N ordered by (row, column).
    fn renumber(&mut self) {
        let total = self.seat_count();
        let width = total.to_string().len().max(2);
        let aisle = self.layout.aisle_after();
        let mut n = 0usize;
        for (r, row) in self.rows.iter_mut().enumerate() {
            for (c, seat) in row.iter_mut().enumerate() {
                n += 1;
                seat.row = r as u32;
                seat.column = c as u32;
                seat.id = SeatId::from_position(r, c);
                seat.seat_number = format!("{n:0width$}");
                seat.side = if c < aisle { Side::Left } else { Side::Right };
            }
        }
    }
}

impl Default for SeatLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}
