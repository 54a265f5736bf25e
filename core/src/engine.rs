use core::fmt;
use core::time::Duration;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::*;

/// How a cell activation is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Reveal,
    Flag,
}

impl Mode {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Reveal => Self::Flag,
            Self::Flag => Self::Reveal,
        }
    }
}

/// Valid transitions:
/// - NotStarted -> InProgress
/// - InProgress -> Won
/// - InProgress -> Lost
/// - any -> NotStarted, through `reset`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Mines not placed yet
    #[default]
    NotStarted,
    InProgress,
    Won,
    Lost,
}

impl Phase {
    pub const fn is_initial(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// No moves are accepted anymore
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    Reset,
    Started,
    Flagged,
    Unflagged,
    Won,
    Lost { triggering_cell: Coord2 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ActivateOutcome {
    Reveal(RevealOutcome),
    Mark(MarkOutcome),
}

impl ActivateOutcome {
    pub const fn has_update(self) -> bool {
        match self {
            Self::Reveal(outcome) => outcome.has_update(),
            Self::Mark(outcome) => outcome.has_update(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub start_tile: StartTile,
    /// Seed for mine placement, drawn from the thread RNG when absent.
    pub seed: Option<u64>,
}

/// One game from first reveal to win or loss, plus its clock and saved state.
pub struct GameSession {
    board: Board,
    mode: Mode,
    phase: Phase,
    first_reveal_done: bool,
    triggered_mine: Option<Coord2>,
    /// Set when the game ends, the clock itself is reset by `stop`.
    final_elapsed: Option<Duration>,
    start_tile: StartTile,
    seeds: SmallRng,
    clock: GameClock,
    storage: Box<dyn Storage>,
    events: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(config: GameConfig, storage: impl Storage + 'static) -> Result<Self> {
        Self::with_parts(config, SessionOptions::default(), GameClock::default(), storage)
    }

    pub fn with_parts(
        config: GameConfig,
        options: SessionOptions,
        clock: GameClock,
        storage: impl Storage + 'static,
    ) -> Result<Self> {
        let board = Board::new(config)?;
        Ok(Self::assemble(board, options, clock, Box::new(storage)))
    }

    /// Session over a fixed mine layout; the first reveal skips generation.
    pub fn from_layout(
        layout: &MineLayout,
        options: SessionOptions,
        clock: GameClock,
        storage: impl Storage + 'static,
    ) -> Result<Self> {
        layout.game_config().validate()?;
        let board = Board::from_layout(layout);
        Ok(Self::assemble(board, options, clock, Box::new(storage)))
    }

    /// Session continuing a saved game.
    pub fn from_snapshot(
        state: &PersistedState,
        options: SessionOptions,
        clock: GameClock,
        storage: impl Storage + 'static,
    ) -> Result<Self> {
        let board = state.to_board()?;
        let mut session = Self::assemble(board, options, clock, Box::new(storage));
        session.apply_snapshot(state);
        Ok(session)
    }

    fn assemble(
        board: Board,
        options: SessionOptions,
        clock: GameClock,
        storage: Box<dyn Storage>,
    ) -> Self {
        let seed = options.seed.unwrap_or_else(|| rand::rng().random());
        Self {
            board,
            mode: Mode::default(),
            phase: Phase::default(),
            first_reveal_done: false,
            triggered_mine: None,
            final_elapsed: None,
            start_tile: options.start_tile,
            seeds: SmallRng::seed_from_u64(seed),
            clock,
            storage,
            events: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn cell(&self, coords: Coord2) -> Result<Cell> {
        self.board.cell(coords)
    }

    pub fn config(&self) -> GameConfig {
        self.board.config()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn toggle_mode(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn is_done(&self) -> bool {
        self.phase.is_finished()
    }

    pub fn is_generated(&self) -> bool {
        self.board.is_generated()
    }

    pub fn first_reveal_done(&self) -> bool {
        self.first_reveal_done
    }

    pub fn mine_count(&self) -> CellCount {
        self.board.mine_count()
    }

    pub fn count_flags(&self) -> CellCount {
        self.board.flags_placed()
    }

    pub fn mines_left(&self) -> isize {
        self.board.mines_left()
    }

    pub fn revealed_count(&self) -> CellCount {
        self.board.revealed_count()
    }

    pub fn triggered_mine(&self) -> Option<Coord2> {
        self.triggered_mine
    }

    /// Every mine once the game is lost, nothing before. Flagged mines are included, their cells keep the flag.
    pub fn exposed_mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        let lost = matches!(self.phase, Phase::Lost);
        self.board.mine_coords().filter(move |_| lost)
    }

    pub fn elapsed(&self) -> Duration {
        self.final_elapsed.unwrap_or_else(|| self.clock.get_time())
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut GameClock {
        &mut self.clock
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    pub fn into_storage(self) -> Box<dyn Storage> {
        self.storage
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        core::mem::take(&mut self.events)
    }

    /// Reveals or flags `coords` depending on the current mode.
    pub fn handle_cell_activate(&mut self, coords: Coord2) -> Result<ActivateOutcome> {
        match self.mode {
            Mode::Reveal => self.reveal(coords).map(ActivateOutcome::Reveal),
            Mode::Flag => self.toggle_flag(coords).map(ActivateOutcome::Mark),
        }
    }

    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealOutcome> {
        let coords = self.board.validate_coords(coords)?;

        if self.phase.is_finished() || !self.board.cell(coords)?.is_hidden() {
            return Ok(RevealOutcome::NoChange);
        }

        if self.first_reveal_done {
            self.resume();
        } else {
            let seed: u64 = self.seeds.random();
            self.board.generate(coords, seed, self.start_tile)?;
            self.first_reveal_done = true;
            self.phase = Phase::InProgress;
            self.events.push(GameEvent::Started);
            log::debug!("game started at {:?}", coords);
            self.clock.start();
        }

        let outcome = self.board.reveal(coords)?;
        match outcome {
            RevealOutcome::HitMine => self.mark_lost(coords),
            RevealOutcome::Won => self.mark_won(),
            RevealOutcome::Revealed | RevealOutcome::NoChange => {}
        }
        Ok(outcome)
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> Result<MarkOutcome> {
        let coords = self.board.validate_coords(coords)?;

        if self.phase.is_finished() {
            return Ok(MarkOutcome::NoChange);
        }

        let outcome = self.board.toggle_flag(coords)?;
        match outcome {
            MarkOutcome::Flagged => self.events.push(GameEvent::Flagged),
            MarkOutcome::Unflagged => self.events.push(GameEvent::Unflagged),
            MarkOutcome::NoChange => return Ok(outcome),
        }
        self.resume();
        Ok(outcome)
    }

    /// Discards the board for a fresh ungenerated one of the same size, and drops any saved game.
    pub fn reset(&mut self) {
        self.board = Board::blank(self.board.config());
        self.mode = Mode::Reveal;
        self.phase = Phase::NotStarted;
        self.first_reveal_done = false;
        self.triggered_mine = None;
        self.final_elapsed = None;
        self.clock.reset();

        if let Err(err) = self.remove_saved_state() {
            log::error!("Could not remove saved game: {:?}", err);
        }

        self.events.push(GameEvent::Reset);
        log::debug!("game reset");
    }

    /// Pauses the clock, e.g. while the game is hidden.
    pub fn pause(&mut self) {
        self.clock.pause();
    }

    /// Restarts a paused clock if the game is still being played.
    pub fn resume(&mut self) {
        if matches!(self.phase, Phase::InProgress) && !self.clock.is_running() {
            self.clock.start();
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState::capture(
            &self.board,
            self.mode,
            self.elapsed(),
            self.first_reveal_done,
            self.triggered_mine,
        )
    }

    pub fn save_state(&mut self) -> Result<()> {
        let payload = self.snapshot().to_json()?;
        self.storage.set(PersistedState::KEY, payload)?;
        log::debug!("game saved");
        Ok(())
    }

    /// Navigating away: stop the clock and keep an unfinished game for later.
    ///
    /// Returns whether a snapshot was written.
    pub fn suspend(&mut self) -> Result<bool> {
        self.pause();
        if self.is_done() || !self.is_generated() {
            return Ok(false);
        }
        self.save_state()?;
        Ok(true)
    }

    /// Replaces the live game with the saved one.
    ///
    /// The snapshot is fully validated before anything changes, so on error the session is left as it was. A
    /// successfully restored snapshot is consumed.
    pub fn restore_saved_state(&mut self) -> Result<()> {
        let state = PersistedState::load(&*self.storage)?;
        self.board = state.to_board()?;
        self.apply_snapshot(&state);

        if let Err(err) = self.remove_saved_state() {
            log::error!("Could not remove restored game: {:?}", err);
        }
        Ok(())
    }

    pub fn remove_saved_state(&mut self) -> Result<()> {
        self.storage.delete(PersistedState::KEY)
    }

    /// Session-level fields of a snapshot whose board is already in place.
    fn apply_snapshot(&mut self, state: &PersistedState) {
        self.mode = state.mode;
        self.phase = state.phase();
        self.first_reveal_done = state.first_reveal_done;
        self.triggered_mine = state.triggered_mine;
        self.events.clear();

        if self.phase.is_finished() {
            self.clock.reset();
            self.final_elapsed = Some(state.elapsed());
        } else {
            self.clock.resume_from(state.elapsed());
            self.final_elapsed = None;
        }
        log::debug!("game restored in {:?} at {:?}", self.phase, state.elapsed());
    }

    fn mark_won(&mut self) {
        self.final_elapsed = Some(self.clock.stop());
        self.phase = Phase::Won;
        self.events.push(GameEvent::Won);
        log::debug!("game won after {:?}", self.final_elapsed);
    }

    fn mark_lost(&mut self, triggering_cell: Coord2) {
        self.final_elapsed = Some(self.clock.stop());
        self.phase = Phase::Lost;
        self.triggered_mine = Some(triggering_cell);
        self.events.push(GameEvent::Lost { triggering_cell });
        log::debug!("game lost at {:?} after {:?}", triggering_cell, self.final_elapsed);
    }
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameSession")
            .field("board", &self.board)
            .field("mode", &self.mode)
            .field("phase", &self.phase)
            .field("first_reveal_done", &self.first_reveal_done)
            .field("triggered_mine", &self.triggered_mine)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
