use std::collections::VecDeque;

use crate::*;

impl Board {
    /// Reveals a hidden cell and cascades through zero-adjacency neighbors.
    ///
    /// Flagged and already revealed cells are left untouched. Hitting a mine reports [`RevealOutcome::HitMine`] and
    /// leaves the board as it was, mines are only ever shown through [`Board::mine_coords`]. An ungenerated board has
    /// no mines to avoid yet, so nothing is revealed on it.
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.validate_coords(coords)?;

        if !self.generated {
            log::debug!("Ignoring reveal at {:?} on an ungenerated board", coords);
            return Ok(RevealOutcome::NoChange);
        }

        Ok(self.reveal_single_cell(coords))
    }

    fn reveal_single_cell(&mut self, coords: Coord2) -> RevealOutcome {
        let cell = self.grid[coords.to_nd_index()];

        match (cell.state, cell.has_mine) {
            (CellState::Hidden, true) => RevealOutcome::HitMine,
            (CellState::Hidden, false) => {
                self.open(coords);
                log::debug!(
                    "Open cell at {:?}, mine count: {}",
                    coords,
                    cell.adjacent_mines
                );

                if cell.adjacent_mines == 0 {
                    self.flood_fill(coords);
                }

                if self.revealed_count.0 == self.safe_cell_count() {
                    RevealOutcome::Won
                } else {
                    RevealOutcome::Revealed
                }
            }
            _ => RevealOutcome::NoChange,
        }
    }

    /// Breadth-first expansion from an opened zero cell.
    ///
    /// Cells are opened as they are queued, so the `Revealed` state doubles as the visited marker and every cell is
    /// queued at most once. Flagged cells are opaque.
    fn flood_fill(&mut self, origin: Coord2) {
        let mut to_visit = VecDeque::from([origin]);
        log::trace!("Starting flood-fill from {:?}", origin);

        while let Some(visit_coords) = to_visit.pop_front() {
            for pos in self.iter_neighbors(visit_coords) {
                let neighbor = self.grid[pos.to_nd_index()];
                if !neighbor.is_hidden() || neighbor.has_mine {
                    continue;
                }

                self.open(pos);
                log::trace!(
                    "Flood opened cell at {:?}, mine count: {}",
                    pos,
                    neighbor.adjacent_mines
                );

                if neighbor.adjacent_mines == 0 {
                    to_visit.push_back(pos);
                }
            }
        }
    }

    fn open(&mut self, coords: Coord2) {
        self.cell_mut(coords).state = CellState::Revealed;
        self.revealed_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(size: Coord2, mines: &[Coord2]) -> Board {
        Board::from_layout(&MineLayout::from_mine_coords(size, mines).unwrap())
    }

    fn count_states(board: &Board, state: CellState) -> usize {
        board.iter_cells().filter(|(_, cell)| cell.state == state).count()
    }

    #[test]
    fn corner_zero_cascades_to_win() {
        let mut board = board((3, 3), &[(0, 0)]);

        assert_eq!(board.reveal((2, 2)).unwrap(), RevealOutcome::Won);
        assert_eq!(board.revealed_count(), 8);
        assert!(board.cell((0, 0)).unwrap().is_hidden());
        assert_eq!(board.cell((1, 1)).unwrap().adjacent_mines, 1);
    }

    #[test]
    fn numbered_cell_does_not_cascade() {
        let mut board = board((3, 3), &[(0, 0)]);

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::Revealed);
        assert_eq!(board.revealed_count(), 1);
    }

    #[test]
    fn hitting_a_mine_leaves_the_board_alone() {
        let mut board = board((3, 3), &[(0, 0), (0, 2), (2, 0)]);
        board.toggle_flag((2, 0)).unwrap();
        board.reveal((1, 1)).unwrap();
        let before = board.clone();

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::HitMine);
        assert_eq!(board, before);
        assert_eq!(board.revealed_count(), 1);
        assert_eq!(board.mine_coords().collect::<Vec<_>>(), vec![(0, 0), (0, 2), (2, 0)]);
    }

    #[test]
    fn hitting_the_last_mine_never_reaches_the_win_count() {
        // every safe cell but one is open, then a mine is hit
        let mut board = board((2, 4), &[(0, 0), (0, 1), (0, 2), (0, 3)]);
        board.reveal((1, 0)).unwrap();
        board.reveal((1, 1)).unwrap();
        board.reveal((1, 2)).unwrap();
        board.toggle_flag((0, 3)).unwrap();

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::HitMine);
        assert_ne!(board.revealed_count(), board.safe_cell_count());
    }

    #[test]
    fn flagged_cells_block_the_cascade() {
        // the mines in column 3 wall off the right side, the flag sits inside the open region
        let mut board = board((3, 5), &[(0, 3), (1, 3), (2, 3)]);
        board.toggle_flag((1, 0)).unwrap();

        assert_eq!(board.reveal((1, 0)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::Revealed);

        assert!(board.cell((1, 0)).unwrap().is_flagged());
        assert_eq!(board.flags_placed(), 1);
        for row in 0..3 {
            assert!(board.cell((row, 2)).unwrap().is_revealed());
            assert!(board.cell((row, 4)).unwrap().is_hidden());
        }
    }

    #[test]
    fn cascade_boundary_is_numbered_or_edge() {
        let mines = [(0, 6), (3, 3), (6, 0), (6, 6), (4, 7)];
        let mut board = board((8, 8), &mines);

        board.reveal((0, 0)).unwrap();

        for (coords, cell) in board.iter_cells() {
            if cell.is_revealed() && cell.adjacent_mines == 0 {
                for pos in board.iter_neighbors(coords) {
                    let neighbor = board.cell(pos).unwrap();
                    assert!(neighbor.is_revealed(), "{:?} next to zero {:?}", pos, coords);
                }
            }
        }
    }

    #[test]
    fn revealed_plus_unrevealed_covers_the_board() {
        let mut board = board((6, 6), &[(1, 4), (4, 1), (5, 5)]);
        board.toggle_flag((1, 4)).unwrap();
        board.reveal((0, 0)).unwrap();
        board.reveal((5, 4)).unwrap();

        let hidden = count_states(&board, CellState::Hidden);
        let flagged = count_states(&board, CellState::Flagged);
        assert_eq!(
            usize::from(board.revealed_count()) + hidden + flagged,
            usize::from(board.total_cells())
        );
        assert_eq!(
            usize::from(board.revealed_count()),
            count_states(&board, CellState::Revealed)
        );
    }

    #[test]
    fn large_empty_board_cascades_without_recursion() {
        let mut board = board((255, 255), &[(254, 254)]);

        assert_eq!(board.reveal((0, 0)).unwrap(), RevealOutcome::Won);
        assert_eq!(board.revealed_count(), 255 * 255 - 1);
    }

    #[test]
    fn reveal_on_ungenerated_board_is_ignored() {
        let mut board = Board::new(GameConfig::new((3, 3), 1).unwrap()).unwrap();

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(board.revealed_count(), 0);
    }

    #[test]
    fn reveal_twice_is_a_no_op() {
        let mut board = board((3, 3), &[(0, 0)]);
        board.reveal((1, 1)).unwrap();

        assert_eq!(board.reveal((1, 1)).unwrap(), RevealOutcome::NoChange);
        assert_eq!(board.revealed_count(), 1);
    }
}
