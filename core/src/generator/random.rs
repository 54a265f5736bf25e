use super::*;

/// Generation strategy that can optionally try to make the starting cell zero or at least safe, but other than that is
/// purely random.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomMinefieldGenerator {
    seed: u64,
    start: Coord2,
    start_tile: StartTile,
}

impl RandomMinefieldGenerator {
    pub fn new(seed: u64, start: Coord2, start_tile: StartTile) -> Self {
        Self {
            seed,
            start,
            start_tile,
        }
    }

    /// Cells that must stay free of mines under the effective start policy.
    fn reserved_cells(&self, config: GameConfig) -> Vec<Coord2> {
        use StartTile::*;

        let total_cells = config.total_cells();
        let neighborhood: Vec<Coord2> = NeighborIter::new(self.start, config.size).collect();
        let zero_cost = 1 + neighborhood.len() as CellCount;

        let actual_start_tile = match self.start_tile {
            Random => Random,
            SimpleSafe | AlwaysZero if config.mines + 1 > total_cells => {
                log::warn!("Cannot make start cell safe, fallback to random");
                Random
            }
            SimpleSafe => SimpleSafe,
            AlwaysZero if config.mines + zero_cost > total_cells => {
                log::warn!("Cannot make start cell zero, fallback to simple safe");
                SimpleSafe
            }
            AlwaysZero => AlwaysZero,
        };

        match actual_start_tile {
            Random => Vec::new(),
            SimpleSafe => vec![self.start],
            AlwaysZero => {
                let mut reserved = neighborhood;
                reserved.push(self.start);
                reserved
            }
        }
    }
}

impl MinefieldGenerator for RandomMinefieldGenerator {
    fn generate(self, config: GameConfig) -> MineLayout {
        use rand::prelude::*;

        let size = config.size;
        let total_cells = config.total_cells();
        let mut mines: Array2<bool> = Array2::default(size.to_nd_index());

        // optimize for full boards
        if config.mines >= total_cells {
            if config.mines > total_cells {
                log::warn!(
                    "Minefield already full, generated anyway, requested {} but only fits {}",
                    config.mines,
                    total_cells
                );
            }
            mines.fill(true);
            return MineLayout::from_mine_mask(mines);
        }

        let reserved = self.reserved_cells(config);
        let mut free_cells: Vec<Coord2> = (0..size.0)
            .flat_map(|row| (0..size.1).map(move |col| (row, col)))
            .filter(|coords| !reserved.contains(coords))
            .collect();

        // partial Fisher-Yates: the first `mines` slots end up a uniform sample
        let mut rng = SmallRng::seed_from_u64(self.seed);
        let wanted = usize::from(config.mines).min(free_cells.len());
        for i in 0..wanted {
            let pick = rng.random_range(i..free_cells.len());
            free_cells.swap(i, pick);
        }
        for &coords in &free_cells[..wanted] {
            mines[coords.to_nd_index()] = true;
        }

        let layout = MineLayout::from_mine_mask(mines);
        if layout.mine_count() != config.mines {
            log::warn!(
                "Generated minefield count mismatch, actual: {}, requested: {}",
                layout.mine_count(),
                config.mines
            );
        }
        layout
    }
}
