use core::num::Saturating;
use serde::{Deserialize, Serialize};

use crate::*;

/// Flag bookkeeping for a board.
///
/// No cap is enforced: placing more flags than there are mines is allowed and makes [`FlagTracker::mines_left`]
/// negative.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagTracker {
    placed: Saturating<CellCount>,
}

impl FlagTracker {
    pub fn placed(&self) -> CellCount {
        self.placed.0
    }

    pub fn mines_left(&self, mine_count: CellCount) -> isize {
        (mine_count as isize) - (self.placed.0 as isize)
    }

    /// Hidden becomes flagged and flagged becomes hidden, revealed cells are left alone.
    pub fn toggle(&mut self, cell: &mut Cell) -> MarkOutcome {
        use CellState::*;

        match cell.state {
            Hidden => {
                cell.state = Flagged;
                self.placed += 1;
                MarkOutcome::Flagged
            }
            Flagged => {
                cell.state = Hidden;
                self.placed -= 1;
                MarkOutcome::Unflagged
            }
            Revealed => MarkOutcome::NoChange,
        }
    }

    pub(crate) fn recount<'a>(cells: impl IntoIterator<Item = &'a Cell>) -> Self {
        let placed = cells.into_iter().filter(|cell| cell.is_flagged()).count() as CellCount;
        Self {
            placed: Saturating(placed),
        }
    }
}

impl Board {
    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        let coords = self.validate_coords(coords)?;
        Ok(self.flags.toggle(&mut self.grid[coords.to_nd_index()]))
    }
}
