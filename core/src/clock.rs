use core::fmt;
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::cell::Cell as SharedCell;
use std::rc::Rc;
use web_time::Instant;

/// Monotonic "now", measured from an arbitrary origin.
pub trait TimeSource {
    fn now(&self) -> Duration;
}

/// Wall-clock time source, works natively and on wasm hosts.
#[derive(Copy, Clone, Debug)]
pub struct MonotonicTime {
    origin: Instant,
}

impl Default for MonotonicTime {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for MonotonicTime {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Time source that only moves when told to. Clones share the same instant.
#[derive(Clone, Debug, Default)]
pub struct ManualTime(Rc<SharedCell<Duration>>);

impl ManualTime {
    pub fn advance(&self, by: Duration) {
        self.0.set(self.0.get() + by);
    }

    pub fn set(&self, now: Duration) {
        self.0.set(now);
    }
}

impl TimeSource for ManualTime {
    fn now(&self) -> Duration {
        self.0.get()
    }
}

/// Cancellable repeating task provided by the host.
///
/// While scheduled, the host is expected to call [`GameClock::tick`] every `period`. Ticks only refresh the display,
/// elapsed time is always recomputed from the [`TimeSource`].
pub trait Ticker {
    fn schedule(&mut self, period: Duration);
    fn cancel(&mut self);
}

/// Ticker for headless hosts that call [`GameClock::tick`] on their own.
#[derive(Copy, Clone, Debug, Default)]
pub struct ManualTicker;

impl Ticker for ManualTicker {
    fn schedule(&mut self, _period: Duration) {}

    fn cancel(&mut self) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSettings {
    pub tick_interval: Duration,
}

impl ClockSettings {
    pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            tick_interval: Self::DEFAULT_TICK_INTERVAL,
        }
    }
}

/// Valid transitions:
/// - Stopped -> Running
/// - Running -> Paused
/// - Paused -> Running
/// - any -> Stopped, through `stop` or `reset`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockState {
    #[default]
    Stopped,
    Running,
    Paused,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClockEvent {
    Start,
    /// Carries the frozen elapsed time.
    Pause(Duration),
    /// Carries the final elapsed time.
    Stop(Duration),
    Reset,
    /// Advisory refresh for whatever shows the elapsed time.
    Display(Duration),
}

/// Elapsed milliseconds rendered as seconds with one fractional digit.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}", elapsed.as_millis() as f64 / 1000.0)
}

/// Elapsed-time state machine for one game session.
pub struct GameClock {
    time: Box<dyn TimeSource>,
    ticker: Box<dyn Ticker>,
    settings: ClockSettings,
    state: ClockState,
    /// `now` at the moment the clock last started running.
    resumed_at: Duration,
    /// Time accumulated before `resumed_at`.
    offset: Duration,
    ticking: bool,
    events: Vec<ClockEvent>,
}

impl GameClock {
    pub fn new(
        settings: ClockSettings,
        time: impl TimeSource + 'static,
        ticker: impl Ticker + 'static,
    ) -> Self {
        Self {
            time: Box::new(time),
            ticker: Box::new(ticker),
            settings,
            state: ClockState::Stopped,
            resumed_at: Duration::ZERO,
            offset: Duration::ZERO,
            ticking: false,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ClockState::Running)
    }

    pub fn settings(&self) -> ClockSettings {
        self.settings
    }

    /// Whether the host's repeating task is currently scheduled.
    pub fn is_ticking(&self) -> bool {
        self.ticking
    }

    pub fn get_time(&self) -> Duration {
        if self.is_running() {
            self.offset + self.time.now().saturating_sub(self.resumed_at)
        } else {
            self.offset
        }
    }

    pub fn display_text(&self) -> String {
        format_elapsed(self.get_time())
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        self.resumed_at = self.time.now();
        self.state = ClockState::Running;
        self.schedule_ticks();
        self.events.push(ClockEvent::Start);
        log::debug!("clock started at offset {:?}", self.offset);
    }

    pub fn pause(&mut self) {
        if !self.is_running() {
            return;
        }

        self.offset = self.get_time();
        self.state = ClockState::Paused;
        self.cancel_ticks();
        self.events.push(ClockEvent::Display(self.offset));
        self.events.push(ClockEvent::Pause(self.offset));
        log::debug!("clock paused at {:?}", self.offset);
    }

    /// Stops a running clock and resets it, returning the final elapsed time.
    ///
    /// A clock that is not running is left alone and reports its accumulated offset.
    pub fn stop(&mut self) -> Duration {
        if !self.is_running() {
            return self.offset;
        }

        let elapsed = self.get_time();
        self.state = ClockState::Stopped;
        self.cancel_ticks();
        self.events.push(ClockEvent::Stop(elapsed));
        log::debug!("clock stopped at {:?}", elapsed);
        self.reset();
        elapsed
    }

    pub fn reset(&mut self) {
        self.resumed_at = Duration::ZERO;
        self.offset = Duration::ZERO;
        self.state = ClockState::Stopped;
        self.cancel_ticks();
        self.events.push(ClockEvent::Reset);
        self.events.push(ClockEvent::Display(Duration::ZERO));
    }

    /// Loads previously accumulated time into a non-running clock, which then waits paused for `start`.
    pub fn resume_from(&mut self, offset: Duration) {
        self.cancel_ticks();
        self.resumed_at = Duration::ZERO;
        self.offset = offset;
        self.state = ClockState::Paused;
        self.events.push(ClockEvent::Display(offset));
    }

    /// Called by the host's repeating task.
    pub fn tick(&mut self) {
        if self.is_running() {
            let elapsed = self.get_time();
            self.events.push(ClockEvent::Display(elapsed));
        }
    }

    pub fn take_events(&mut self) -> Vec<ClockEvent> {
        core::mem::take(&mut self.events)
    }

    fn schedule_ticks(&mut self) {
        if !self.ticking {
            self.ticker.schedule(self.settings.tick_interval);
            self.ticking = true;
        }
    }

    fn cancel_ticks(&mut self) {
        if self.ticking {
            self.ticker.cancel();
            self.ticking = false;
        }
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(
            ClockSettings::default(),
            MonotonicTime::default(),
            ManualTicker,
        )
    }
}

impl fmt::Debug for GameClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameClock")
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("resumed_at", &self.resumed_at)
            .field("ticking", &self.ticking)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records schedule/cancel calls so tests can see the repeating task's lifetime.
    #[derive(Clone, Default)]
    struct RecordingTicker(Rc<SharedCell<Option<Duration>>>);

    impl Ticker for RecordingTicker {
        fn schedule(&mut self, period: Duration) {
            self.0.set(Some(period));
        }

        fn cancel(&mut self) {
            self.0.set(None);
        }
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    fn clock() -> (GameClock, ManualTime, RecordingTicker) {
        let time = ManualTime::default();
        let ticker = RecordingTicker::default();
        let clock = GameClock::new(ClockSettings::default(), time.clone(), ticker.clone());
        (clock, time, ticker)
    }

    #[test]
    fn new_clock_is_stopped_at_zero() {
        let (clock, _, _) = clock();

        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.get_time(), Duration::ZERO);
        assert_eq!(clock.display_text(), "0.0");
    }

    #[test]
    fn running_clock_follows_time_source() {
        let (mut clock, time, ticker) = clock();
        time.set(ms(5_000));

        clock.start();
        time.advance(ms(1_234));

        assert_eq!(clock.get_time(), ms(1_234));
        assert_eq!(clock.display_text(), "1.2");
        assert_eq!(ticker.0.get(), Some(ClockSettings::DEFAULT_TICK_INTERVAL));
        assert_eq!(clock.take_events(), vec![ClockEvent::Start]);
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let (mut clock, time, _) = clock();
        clock.start();
        time.advance(ms(300));

        clock.start();
        time.advance(ms(200));

        assert_eq!(clock.get_time(), ms(500));
        assert_eq!(clock.take_events(), vec![ClockEvent::Start]);
    }

    #[test]
    fn pause_freezes_time_and_cancels_ticks() {
        let (mut clock, time, ticker) = clock();
        clock.start();
        time.advance(ms(700));

        clock.pause();
        time.advance(ms(10_000));

        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.get_time(), ms(700));
        assert_eq!(ticker.0.get(), None);
        assert!(!clock.is_ticking());
        assert!(clock.take_events().contains(&ClockEvent::Pause(ms(700))));
    }

    #[test]
    fn pause_then_start_keeps_elapsed_time() {
        let (mut clock, time, _) = clock();
        clock.start();
        time.advance(ms(450));

        clock.pause();
        let before = clock.get_time();
        clock.start();

        assert_eq!(clock.get_time(), before);
        time.advance(ms(50));
        assert_eq!(clock.get_time(), ms(500));
    }

    #[test]
    fn stop_returns_elapsed_then_resets() {
        let (mut clock, time, ticker) = clock();
        clock.start();
        time.advance(ms(2_500));
        let before = clock.get_time();
        clock.take_events();

        assert_eq!(clock.stop(), before);
        assert_eq!(clock.get_time(), Duration::ZERO);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(ticker.0.get(), None);
        assert_eq!(
            clock.take_events(),
            vec![
                ClockEvent::Stop(ms(2_500)),
                ClockEvent::Reset,
                ClockEvent::Display(Duration::ZERO),
            ]
        );
    }

    #[test]
    fn stop_on_paused_clock_reports_offset_without_resetting() {
        let (mut clock, time, _) = clock();
        clock.start();
        time.advance(ms(900));
        clock.pause();

        assert_eq!(clock.stop(), ms(900));
        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.get_time(), ms(900));
    }

    #[test]
    fn reset_zeroes_and_forces_display() {
        let (mut clock, time, _) = clock();
        clock.start();
        time.advance(ms(900));
        clock.take_events();

        clock.reset();

        assert_eq!(clock.get_time(), Duration::ZERO);
        assert_eq!(
            clock.take_events(),
            vec![ClockEvent::Reset, ClockEvent::Display(Duration::ZERO)]
        );
    }

    #[test]
    fn resume_from_restored_offset() {
        let (mut clock, time, _) = clock();
        time.set(ms(1_000));

        clock.resume_from(ms(12_300));
        assert_eq!(clock.state(), ClockState::Paused);
        assert_eq!(clock.get_time(), ms(12_300));

        clock.start();
        time.advance(ms(700));
        assert_eq!(clock.get_time(), ms(13_000));
    }

    #[test]
    fn ticks_only_display_while_running() {
        let (mut clock, time, _) = clock();
        clock.tick();
        assert!(clock.take_events().is_empty());

        clock.start();
        time.advance(ms(100));
        clock.tick();

        assert_eq!(
            clock.take_events(),
            vec![ClockEvent::Start, ClockEvent::Display(ms(100))]
        );
    }

    #[test]
    fn format_uses_one_fractional_digit() {
        assert_eq!(format_elapsed(Duration::ZERO), "0.0");
        assert_eq!(format_elapsed(ms(61_040)), "61.0");
        assert_eq!(format_elapsed(ms(9_960)), "10.0");
        assert_eq!(format_elapsed(ms(123_400)), "123.4");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn monotonic_clock_measures_real_time() {
        let mut clock = GameClock::default();
        clock.start();

        std::thread::sleep(ms(50));

        let elapsed = clock.get_time();
        assert!(elapsed >= ms(50), "{:?}", elapsed);
        assert!(elapsed < ms(1_000), "{:?}", elapsed);
    }
}
