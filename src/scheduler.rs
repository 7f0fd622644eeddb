//! The main loop.
//!
//! One cooperative loop owns every piece of mutable state: the source
//! caches, alarm records, navigation and the animation counter. Each tick
//! runs up to three independent cadences, each gated by its own due time:
//!
//! - data refresh: fetch stale keys for the current view and the alarm rules
//! - alarm check: evaluate rules against whatever is cached
//! - display refresh: advance the animation frame and redraw
//!
//! A tick never waits on a source. The data cadence starts an owned refresh
//! batch; `run` polls it next to the ticker and stores its results when it
//! lands, so a hung source cannot hold back alarms or redraws.
//!
//! Button presses arrive over a bounded channel and are drained at the start
//! of every tick, so navigation is never mutated from outside the loop.

use crate::alarms::{AlarmEngine, AlarmRules, Firing};
use crate::config::Config;
use crate::error::Result;
use crate::hardware::{Button, Buzzer, DefaultBuzzer, Display, LogDisplay};
use crate::navigation::{ButtonEvent, Navigator, View};
use crate::pages::{self, PageContext, Screen, SPINNER_FRAMES};
use crate::telemetry::context::{GlancesFeed, RaidFeed, SystemFeed};
use crate::telemetry::{
    GlancesSource, MdadmSource, Need, RefreshBatch, RefreshResults, SystemSource, Telemetry,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Current time on the Tokio clock, so paused-time tests drive the loop.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Free-running display counter used to animate icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    counter: usize,
    modulus: usize,
}

impl AnimationFrame {
    pub fn new(modulus: usize) -> Self {
        Self {
            counter: 0,
            modulus: modulus.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.counter
    }

    pub fn advance(&mut self) -> usize {
        self.counter = (self.counter + 1) % self.modulus;
        self.counter
    }
}

impl Default for AnimationFrame {
    fn default() -> Self {
        Self::new(SPINNER_FRAMES)
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub presses: usize,
    /// Fetches stored this tick, or `None` when no refresh finished
    pub fetched: Option<usize>,
    pub fired: Vec<Firing>,
    pub rendered: Option<Screen>,
}

/// What woke the run loop.
enum Wake<T> {
    Shutdown,
    Tick,
    Refreshed(T),
}

/// Resolves with the in-flight batch's output, or never when idle.
async fn landed<T>(batch: &mut Option<BoxFuture<'static, T>>) -> T {
    match batch {
        Some(batch) => batch.await,
        None => std::future::pending().await,
    }
}

/// Due times of the three cadences.
#[derive(Debug, Clone, Copy)]
struct Cadence {
    interval: Duration,
    due: Instant,
}

impl Cadence {
    fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, due: now }
    }

    /// Whether the cadence is due; if so the next due time is scheduled.
    fn poll(&mut self, now: Instant) -> bool {
        if now < self.due {
            return false;
        }
        self.due = now + self.interval;
        true
    }

    fn expedite(&mut self, now: Instant) {
        self.due = now;
    }
}

pub struct Scheduler<D = LogDisplay, B = DefaultBuzzer, G = GlancesSource, R = MdadmSource, S = SystemSource>
where
    D: Display,
    B: Buzzer,
    G: GlancesFeed,
    R: RaidFeed,
    S: SystemFeed,
{
    telemetry: Telemetry<G, R, S>,
    alarms: AlarmEngine,
    navigator: Navigator,
    frame: AnimationFrame,
    page_ctx: PageContext,
    display: D,
    buzzer: B,
    buttons: mpsc::Receiver<ButtonEvent>,
    button: Option<Box<dyn Button>>,
    in_flight: Option<RefreshBatch<G, R, S>>,
    tick_interval: Duration,
    data: Cadence,
    alarm: Cadence,
    redraw: Cadence,
    released: bool,
}

impl<D, B, G, R, S> Scheduler<D, B, G, R, S>
where
    D: Display,
    B: Buzzer,
    G: GlancesFeed,
    R: RaidFeed,
    S: SystemFeed,
{
    pub fn new(
        config: &Config,
        telemetry: Telemetry<G, R, S>,
        display: D,
        buzzer: B,
        buttons: mpsc::Receiver<ButtonEvent>,
    ) -> Self {
        let now = now();
        Self {
            telemetry,
            alarms: AlarmEngine::new(AlarmRules::from_config(config)),
            navigator: Navigator::new(pages::Page::ALL.len(), config.nav_timeout(), now),
            frame: AnimationFrame::default(),
            page_ctx: PageContext::from_config(config),
            display,
            buzzer,
            buttons,
            button: None,
            in_flight: None,
            tick_interval: config.tick_interval().max(Duration::from_millis(1)),
            data: Cadence::new(config.data_interval(), now),
            alarm: Cadence::new(config.alarm_interval(), now),
            redraw: Cadence::new(config.display_interval(), now),
            released: false,
        }
    }

    /// Hand over the button driver so it is deregistered on release.
    pub fn with_button(mut self, button: impl Button + 'static) -> Self {
        self.button = Some(Box::new(button));
        self
    }

    pub fn telemetry(&self) -> &Telemetry<G, R, S> {
        &self.telemetry
    }

    pub fn alarms(&self) -> &AlarmEngine {
        &self.alarms
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn frame(&self) -> AnimationFrame {
        self.frame
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn buzzer(&self) -> &B {
        &self.buzzer
    }

    /// Keys the next data refresh will request.
    pub fn needs(&self) -> Vec<Need> {
        let mut needs = pages::needs_for(self.navigator.view());
        needs.extend(self.alarms.rules().needs());
        needs
    }

    /// Whether a data refresh is still running.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Run one pass of the loop at `now`. Never waits on a source.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        let before = self.navigator.view();

        while let Ok(event) = self.buttons.try_recv() {
            let view = self.navigator.handle(event, now);
            debug!("Button: now showing {:?}", view);
            outcome.presses += 1;
        }
        if self.navigator.check_timeout(now) {
            debug!("Navigation timeout, returning home");
        }
        if self.navigator.view() != before {
            // The new view gets its data and a redraw this tick.
            self.data.expedite(now);
            self.redraw.expedite(now);
        }

        // One batch at a time; a due refresh waits for the running one.
        if self.in_flight.is_none() && self.data.poll(now) {
            let needs = self.needs();
            match self.telemetry.begin_refresh(&needs, now) {
                Some(batch) => self.in_flight = Some(batch),
                None => outcome.fetched = Some(0),
            }
        }
        let finished = self.in_flight.as_mut().and_then(|batch| batch.now_or_never());
        if let Some(results) = finished {
            outcome.fetched = Some(self.land(results));
        }

        if self.alarm.poll(now) {
            outcome.fired = self.alarms.check(&self.telemetry, now);
            for firing in &outcome.fired {
                if let Err(e) = self.buzzer.play(firing.pattern) {
                    warn!("Buzzer failed for {}: {}", firing.id, e);
                }
            }
        }

        if self.redraw.poll(now) {
            self.frame.advance();
            let ctx = self.page_ctx.clone().with_frame(self.frame.current());
            let screen = pages::render(self.navigator.view(), &self.telemetry, &ctx);
            self.draw(&screen);
            outcome.rendered = Some(screen);
        }

        outcome
    }

    fn land(&mut self, results: RefreshResults<G, R, S>) -> usize {
        self.in_flight = None;
        let fetched = self.telemetry.finish_refresh(results);
        debug!("Refresh stored {} values", fetched);
        fetched
    }

    fn draw(&mut self, screen: &Screen) {
        if let Err(e) = self.display.show(screen) {
            warn!("Display update failed: {}", e);
            let detail: String = e.to_string().chars().take(20).collect();
            if let Err(e) = self.display.show_error("OLED ERR", Some(&detail)) {
                debug!("Error screen failed too: {}", e);
            }
        }
    }

    /// Tick until `shutdown` resolves, then release the hardware.
    ///
    /// Release also runs when the scheduler is dropped, so a panic inside
    /// the loop still leaves the panel blank and the buzzer quiet.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduler started, tick every {:?}", self.tick_interval);
        loop {
            let wake = tokio::select! {
                _ = &mut shutdown => Wake::Shutdown,
                results = landed(&mut self.in_flight) => Wake::Refreshed(results),
                _ = ticker.tick() => Wake::Tick,
            };
            match wake {
                Wake::Shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                Wake::Refreshed(results) => {
                    self.land(results);
                }
                Wake::Tick => {
                    self.tick(now());
                }
            }
        }

        self.release()
    }

    /// Blank the display, silence the buzzer and deregister the button.
    ///
    /// Every step is attempted; the first failure is returned. Idempotent.
    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.in_flight = None;

        let mut first_error = None;
        if let Err(e) = self.display.clear() {
            warn!("Failed to clear display: {}", e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.buzzer.silence() {
            warn!("Failed to silence buzzer: {}", e);
            first_error.get_or_insert(e);
        }
        if let Some(mut button) = self.button.take() {
            if let Err(e) = button.release() {
                warn!("Failed to release button: {}", e);
                first_error.get_or_insert(e);
            }
        }
        self.buttons.close();
        info!("Hardware released");

        first_error.map_or(Ok(()), Err)
    }

    pub fn view(&self) -> View {
        self.navigator.view()
    }
}

impl<D, B, G, R, S> Drop for Scheduler<D, B, G, R, S>
where
    D: Display,
    B: Buzzer,
    G: GlancesFeed,
    R: RaidFeed,
    S: SystemFeed,
{
    fn drop(&mut self) {
        let _ = self.release();
    }
}
