//! Story slideshow
//!
//! [`StoryViewer`] is the pure state machine; [`StoryPlayer`] drives it from
//! a fixed-period ticker and a control channel.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::StoryConfig;
use crate::models::{MediaKind, Story};

#[derive(Debug, Clone)]
pub struct StoryViewer {
    stories: Vec<Story>,
    index: usize,
    progress: f64,
    closed: bool,
    tick_ms: u64,
    image_ms: u64,
    video_ms: u64,
}

/// What the viewer shows right now
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub index: usize,
    pub progress: f64,
    pub closed: bool,
}

impl StoryViewer {
    /// Open at `start`. A start past the end is clamped to the last story;
    /// an empty list opens closed.
    pub fn new(stories: Vec<Story>, start: usize, config: &StoryConfig) -> Self {
        let closed = stories.is_empty();
        let index = start.min(stories.len().saturating_sub(1));
        Self {
            stories,
            index,
            progress: 0.0,
            closed,
            tick_ms: config.tick_ms.max(1),
            image_ms: config.image_duration_ms.max(1),
            video_ms: config.video_duration_ms.max(1),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn current(&self) -> Option<&Story> {
        if self.closed {
            None
        } else {
            self.stories.get(self.index)
        }
    }

    pub fn snapshot(&self) -> ViewerSnapshot {
        ViewerSnapshot {
            index: self.index,
            progress: self.progress,
            closed: self.closed,
        }
    }

    fn duration_ms(&self) -> u64 {
        match self.current().map(|s| s.media_type) {
            Some(MediaKind::Video) => self.video_ms,
            _ => self.image_ms,
        }
    }

    /// One ticker period elapsed.
    pub fn tick(&mut self) {
        if self.closed {
            return;
        }
        self.progress += self.tick_ms as f64 / self.duration_ms() as f64 * 100.0;
        if self.progress >= 100.0 {
            self.next();
        }
    }

    /// Move on, or close after the last story.
    pub fn next(&mut self) {
        if self.closed {
            return;
        }
        if self.index + 1 < self.stories.len() {
            self.index += 1;
            self.progress = 0.0;
        } else {
            self.close();
        }
    }

    /// Go back one story; no-op on the first.
    pub fn prev(&mut self) {
        if self.closed || self.index == 0 {
            return;
        }
        self.index -= 1;
        self.progress = 0.0;
    }

    pub fn close(&mut self) {
        self.closed = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerControl {
    Prev,
    Next,
    Close,
}

/// A running slideshow
pub struct StoryPlayer {
    controls: mpsc::Sender<ViewerControl>,
    state: watch::Receiver<ViewerSnapshot>,
    handle: JoinHandle<StoryViewer>,
}

impl StoryPlayer {
    pub fn spawn(mut viewer: StoryViewer) -> Self {
        let (controls, mut control_rx) = mpsc::channel(16);
        let (state_tx, state) = watch::channel(viewer.snapshot());
        let period = Duration::from_millis(viewer.tick_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !viewer.is_closed() {
                tokio::select! {
                    _ = ticker.tick() => viewer.tick(),
                    control = control_rx.recv() => match control {
                        Some(ViewerControl::Prev) => viewer.prev(),
                        Some(ViewerControl::Next) => viewer.next(),
                        Some(ViewerControl::Close) | None => viewer.close(),
                    },
                }
                state_tx.send_replace(viewer.snapshot());
            }
            tracing::debug!(index = viewer.index(), "story viewer closed");
            viewer
        });

        Self {
            controls,
            state,
            handle,
        }
    }

    pub async fn send(&self, control: ViewerControl) {
        // The task is gone once the viewer has closed.
        let _ = self.controls.send(control).await;
    }

    pub fn state(&self) -> watch::Receiver<ViewerSnapshot> {
        self.state.clone()
    }

    /// Wait for the viewer to close and return its final state.
    pub async fn finished(self) -> Result<StoryViewer, tokio::task::JoinError> {
        self.handle.await
    }
}
