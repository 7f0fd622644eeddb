//! Button-driven page cursor with an inactivity timeout.

use std::time::{Duration, Instant};

/// A discrete input delivered from the button collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed,
}

/// Where the display is pointed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Page(usize),
}

/// Navigation state. Lives inside the scheduler loop and is only mutated there.
#[derive(Debug, Clone)]
pub struct Navigator {
    current_page: Option<usize>,
    last_interaction_at: Instant,
    page_count: usize,
    timeout: Duration,
}

impl Navigator {
    pub fn new(page_count: usize, timeout: Duration, now: Instant) -> Self {
        Self {
            current_page: None,
            last_interaction_at: now,
            page_count,
            timeout,
        }
    }

    pub fn view(&self) -> View {
        self.current_page.map_or(View::Home, View::Page)
    }

    pub fn last_interaction_at(&self) -> Instant {
        self.last_interaction_at
    }

    /// Advance to the next page, wrapping; Home goes to the first page.
    pub fn press(&mut self, now: Instant) -> View {
        self.last_interaction_at = now;
        if self.page_count == 0 {
            return self.view();
        }
        self.current_page = Some(match self.current_page {
            None => 0,
            Some(i) => (i + 1) % self.page_count,
        });
        self.view()
    }

    pub fn handle(&mut self, event: ButtonEvent, now: Instant) -> View {
        match event {
            ButtonEvent::Pressed => self.press(now),
        }
    }

    /// Return to Home once the timeout has elapsed since the last press.
    ///
    /// The interaction timestamp is left alone, so repeated checks are
    /// idempotent. Returns whether this call changed the view.
    pub fn check_timeout(&mut self, now: Instant) -> bool {
        if self.current_page.is_some()
            && now.saturating_duration_since(self.last_interaction_at) >= self.timeout
        {
            self.current_page = None;
            return true;
        }
        false
    }
}
