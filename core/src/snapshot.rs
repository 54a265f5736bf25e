use core::num::Saturating;
use core::time::Duration;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedCell {
    pub row: Coord,
    pub col: Coord,
    pub state: CellState,
    pub has_mine: bool,
    pub adjacent_mine_count: u8,
}

/// Everything needed to rebuild an identical session, written on suspend and read on resume.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub dimensions: Coord2,
    pub mine_count: CellCount,
    pub cells: Vec<PersistedCell>,
    pub mode: Mode,
    pub elapsed_ms: u64,
    pub first_reveal_done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_mine: Option<Coord2>,
}

impl StorageKey for PersistedState {
    const KEY: &'static str = "mines:saved-state:v1";
}

impl PersistedState {
    pub fn capture(
        board: &Board,
        mode: Mode,
        elapsed: Duration,
        first_reveal_done: bool,
        triggered_mine: Option<Coord2>,
    ) -> Self {
        let cells = board
            .iter_cells()
            .map(|((row, col), cell)| PersistedCell {
                row,
                col,
                state: cell.state,
                has_mine: cell.has_mine,
                adjacent_mine_count: cell.adjacent_mines,
            })
            .collect();

        Self {
            dimensions: board.size(),
            mine_count: board.mine_count(),
            cells,
            mode,
            elapsed_ms: elapsed.as_millis().try_into().unwrap_or(u64::MAX),
            first_reveal_done,
            triggered_mine,
        }
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| GameError::Storage(err.to_string()))
    }

    /// Reads and validates the saved game from `storage`.
    pub fn load(storage: &dyn Storage) -> Result<Self> {
        let payload = storage.get(Self::KEY)?.ok_or(GameError::NoSavedState)?;
        Self::from_json(&payload)
    }

    /// Parses and validates a stored payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let state: Self =
            serde_json::from_str(payload).map_err(|err| GameError::corrupt(err.to_string()))?;
        state.validate()?;
        Ok(state)
    }

    /// Checks that the snapshot describes a board this engine could have produced.
    pub fn validate(&self) -> Result<()> {
        self.build_board().map(|_| ())
    }

    /// Builds a fresh board from the snapshot, leaving any live board untouched.
    pub fn to_board(&self) -> Result<Board> {
        self.build_board()
    }

    /// Lifecycle phase implied by the triggered mine and the cell states.
    pub fn phase(&self) -> Phase {
        let safe_revealed = self
            .cells
            .iter()
            .filter(|cell| !cell.has_mine && cell.state == CellState::Revealed)
            .count();
        let safe_cells = self.cells.len().saturating_sub(usize::from(self.mine_count));

        if self.triggered_mine.is_some() {
            Phase::Lost
        } else if self.first_reveal_done && safe_revealed == safe_cells {
            Phase::Won
        } else if self.first_reveal_done {
            Phase::InProgress
        } else {
            Phase::NotStarted
        }
    }

    fn build_board(&self) -> Result<Board> {
        let config = GameConfig::new_unchecked(self.dimensions, self.mine_count);
        config
            .validate()
            .map_err(|_| GameError::corrupt("impossible board configuration"))?;

        if self.cells.len() != usize::from(config.total_cells()) {
            return Err(GameError::corrupt(format!(
                "expected {} cells, found {}",
                config.total_cells(),
                self.cells.len()
            )));
        }

        let mut grid: Array2<Option<Cell>> = Array2::default(self.dimensions.to_nd_index());
        for persisted in &self.cells {
            let coords = (persisted.row, persisted.col);
            if coords.0 >= self.dimensions.0 || coords.1 >= self.dimensions.1 {
                return Err(GameError::corrupt(format!("cell {:?} is off the board", coords)));
            }
            let slot = &mut grid[coords.to_nd_index()];
            if slot.is_some() {
                return Err(GameError::corrupt(format!("cell {:?} appears twice", coords)));
            }
            *slot = Some(Cell {
                state: persisted.state,
                has_mine: persisted.has_mine,
                adjacent_mines: persisted.adjacent_mine_count,
            });
        }
        // every slot is filled: the count matched and no position repeated
        let grid = grid.mapv(Option::unwrap_or_default);

        let marked_mines = grid.iter().filter(|cell| cell.has_mine).count();
        let generated = self.first_reveal_done || marked_mines > 0;

        if generated {
            if marked_mines != usize::from(self.mine_count) {
                return Err(GameError::corrupt(format!(
                    "mine count {} disagrees with {} marked mines",
                    self.mine_count, marked_mines
                )));
            }
            for ((row, col), cell) in grid.indexed_iter() {
                let coords = (row as Coord, col as Coord);
                let expected = grid
                    .iter_neighbors(coords)
                    .filter(|&pos| grid[pos.to_nd_index()].has_mine)
                    .count();
                if usize::from(cell.adjacent_mines) != expected {
                    return Err(GameError::corrupt(format!(
                        "cell {:?} claims {} adjacent mines, layout has {}",
                        coords, cell.adjacent_mines, expected
                    )));
                }
            }
        } else if grid
            .iter()
            .any(|cell| cell.adjacent_mines != 0 || cell.is_revealed())
        {
            return Err(GameError::corrupt("ungenerated board has revealed or numbered cells"));
        }

        if grid.iter().any(|cell| cell.has_mine && cell.is_revealed()) {
            return Err(GameError::corrupt("a mine is revealed"));
        }

        let revealed_count = grid.iter().filter(|cell| cell.is_revealed()).count() as CellCount;

        if !self.first_reveal_done && revealed_count > 0 {
            return Err(GameError::corrupt("revealed cells before the first reveal"));
        }

        if let Some(coords) = self.triggered_mine {
            let triggered = (coords.0 < self.dimensions.0 && coords.1 < self.dimensions.1)
                .then(|| grid[coords.to_nd_index()]);
            if !matches!(triggered, Some(cell) if cell.has_mine && cell.is_hidden()) {
                return Err(GameError::corrupt(format!(
                    "triggered mine {:?} is not a hidden mine",
                    coords
                )));
            }
            if !self.first_reveal_done {
                return Err(GameError::corrupt("mine triggered before the first reveal"));
            }
            if revealed_count == config.safe_cells() {
                return Err(GameError::corrupt("lost game has every safe cell revealed"));
            }
        } else if self.first_reveal_done && revealed_count == 0 {
            // the first reveal either opens a cell or hits a mine
            return Err(GameError::corrupt("started game without revealed cells"));
        }

        let flags = FlagTracker::recount(grid.iter());

        Ok(Board {
            grid,
            mine_count: self.mine_count,
            generated,
            revealed_count: Saturating(revealed_count),
            flags,
        })
    }
}
