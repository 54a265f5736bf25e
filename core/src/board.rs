use core::num::Saturating;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// The cell grid of one game together with its counters.
///
/// Mines are placed lazily: a fresh board only knows how many mines it will hold. [`Board::generate`] picks the
/// positions once the first reveal is known, so that reveal cannot be fatal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub(crate) grid: Array2<Cell>,
    pub(crate) mine_count: CellCount,
    pub(crate) generated: bool,
    pub(crate) revealed_count: Saturating<CellCount>,
    pub(crate) flags: FlagTracker,
}

impl Board {
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::blank(config))
    }

    /// Board with a fixed layout, already generated.
    pub fn from_layout(layout: &MineLayout) -> Self {
        let mut board = Self::blank(layout.game_config());
        board.lay_mines(layout);
        board
    }

    pub(crate) fn blank(config: GameConfig) -> Self {
        Self {
            grid: Array2::default(config.size.to_nd_index()),
            mine_count: config.mines,
            generated: false,
            revealed_count: Saturating(0),
            flags: FlagTracker::default(),
        }
    }

    pub fn config(&self) -> GameConfig {
        GameConfig::new_unchecked(self.size(), self.mine_count)
    }

    pub fn size(&self) -> Coord2 {
        grid_size(&self.grid)
    }

    pub fn total_cells(&self) -> CellCount {
        self.grid.len() as CellCount
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn revealed_count(&self) -> CellCount {
        self.revealed_count.0
    }

    pub fn flags_placed(&self) -> CellCount {
        self.flags.placed()
    }

    pub fn mines_left(&self) -> isize {
        self.flags.mines_left(self.mine_count)
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn validate_coords(&self, coords: Coord2) -> Result<Coord2> {
        let size = self.size();
        if coords.0 < size.0 && coords.1 < size.1 {
            Ok(coords)
        } else {
            Err(GameError::OutOfBounds)
        }
    }

    pub fn cell(&self, coords: Coord2) -> Result<Cell> {
        let coords = self.validate_coords(coords)?;
        Ok(self.grid[coords.to_nd_index()])
    }

    /// Every cell in row-major order with its coordinates.
    pub fn iter_cells(&self) -> impl Iterator<Item = (Coord2, Cell)> + '_ {
        self.grid
            .indexed_iter()
            .map(|((row, col), &cell)| ((row as Coord, col as Coord), cell))
    }

    /// Positions of every mine in row-major order, for showing the field once a game is lost.
    pub fn mine_coords(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.iter_cells()
            .filter(|(_, cell)| cell.has_mine)
            .map(|(coords, _)| coords)
    }

    pub fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.grid.iter_neighbors(coords)
    }

    /// Places the mines, keeping `exclude` (and its neighborhood, when there is room) clear.
    ///
    /// Does nothing once the board has been generated.
    pub fn generate(&mut self, exclude: Coord2, seed: u64, start_tile: StartTile) -> Result<()> {
        let exclude = self.validate_coords(exclude)?;
        if self.generated {
            return Ok(());
        }

        let config = self.config();
        config.validate()?;
        let layout = RandomMinefieldGenerator::new(seed, exclude, start_tile).generate(config);
        log::debug!(
            "Generated {} mines on {:?} board, start at {:?}",
            layout.mine_count(),
            config.size,
            exclude
        );
        self.lay_mines(&layout);
        Ok(())
    }

    /// Copies mine positions from `layout` and computes every cell's adjacency count.
    pub(crate) fn lay_mines(&mut self, layout: &MineLayout) {
        if self.generated {
            return;
        }

        for (index, cell) in self.grid.indexed_iter_mut() {
            let coords = (index.0 as Coord, index.1 as Coord);
            cell.has_mine = layout.contains_mine(coords);
            cell.adjacent_mines = layout.adjacent_mine_count(coords);
        }
        self.mine_count = layout.mine_count();
        self.generated = true;
    }

    pub(crate) fn cell_mut(&mut self, coords: Coord2) -> &mut Cell {
        &mut self.grid[coords.to_nd_index()]
    }
}
