use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::Track;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current track
    Track,
    /// Send finished tracks to the back of the queue
    Queue,
}

#[derive(Debug, Clone)]
pub struct Queue {
    items: VecDeque<Track>,
    current: Option<Track>,
    history: VecDeque<Track>,
    repeat: RepeatMode,
    max_size: usize,
    max_history: usize,
}

impl Queue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            current: None,
            history: VecDeque::new(),
            repeat: RepeatMode::Off,
            max_size,
            max_history: 50,
        }
    }

    /// Agrega un track al final de la cola
    pub fn add(&mut self, track: Track) -> Result<()> {
        if self.items.len() >= self.max_size {
            return Err(Error::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", track.title);
        self.items.push_back(track);

        Ok(())
    }

    /// Adds as many tracks as fit, returns how many were added.
    pub fn add_all(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let available = self.max_size.saturating_sub(self.items.len());
        let before = self.items.len();

        self.items.extend(tracks.into_iter().take(available));

        let added = self.items.len() - before;
        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Moves to the next track, honouring the repeat mode.
    pub fn next_track(&mut self) -> Option<Track> {
        self.advance(false)
    }

    /// Moves to the next track; a repeated single track is left behind.
    pub fn skip_track(&mut self) -> Option<Track> {
        self.advance(true)
    }

    fn advance(&mut self, skipping: bool) -> Option<Track> {
        if let Some(finished) = self.current.take() {
            match self.repeat {
                RepeatMode::Track if !skipping => {
                    debug!("🔂 Repitiendo track: {}", finished.title);
                    self.current = Some(finished.clone());
                    return Some(finished);
                }
                RepeatMode::Queue => self.items.push_back(finished.clone()),
                _ => {}
            }

            self.remember(finished);
        }

        self.current = self.items.pop_front();

        if self.current.is_none() {
            debug!("📭 Cola vacía, no hay siguiente track");
        }

        self.current.clone()
    }

    /// Drops the current track without advancing.
    pub fn clear_current(&mut self) -> Option<Track> {
        self.current.take()
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Upcoming tracks in play order.
    pub fn upcoming(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn history(&self) -> impl Iterator<Item = &Track> {
        self.history.iter()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        match mode {
            RepeatMode::Off => info!("➡️ Repetición desactivada"),
            RepeatMode::Track => info!("🔂 Repetir canción activado"),
            RepeatMode::Queue => info!("🔁 Repetir cola activado"),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    pub fn shuffle(&mut self) {
        self.items.make_contiguous().shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada");
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        self.items.remove(index)
    }

    /// Moves a track to a new position; false when either index is out of range.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }

        if from != to {
            if let Some(track) = self.items.remove(from) {
                self.items.insert(to, track);
                debug!("📍 Track movido de posición {} a {}", from, to);
            }
        }

        true
    }

    /// Drops repeated payloads, keeping the first occurrence.
    pub fn dedupe(&mut self) -> usize {
        let mut seen = HashSet::new();
        let before = self.items.len();

        self.items.retain(|track| seen.insert(track.encoded.clone()));

        before - self.items.len()
    }

    pub fn remove_requester(&mut self, user_id: UserId) -> usize {
        let before = self.items.len();
        self.items.retain(|track| track.requester != Some(user_id));

        before - self.items.len()
    }

    /// Duration of the current track plus everything queued.
    pub fn total_duration(&self) -> Duration {
        let queued: Duration = self.items.iter().map(|t| t.duration).sum();

        queued + self.current.as_ref().map(|t| t.duration).unwrap_or_default()
    }

    fn remember(&mut self, track: Track) {
        self.history.push_back(track);

        if self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }
}
