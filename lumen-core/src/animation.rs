//! Keyframe animation tracks
//!
//! Each track is a sorted list of `(time, value, easing)` keyframes and a
//! cursor. Tracks only hold progress state; whoever owns them decides what
//! the sampled values drive. All interpolation is integer, in permille.

use heapless::Vec;
use lumen_protocol::{AnimationId, Easing, LoopMode};

/// Number of animation tracks
pub const MAX_ANIMATIONS: usize = 8;

/// Keyframes per track
pub const MAX_KEYFRAMES: usize = 16;

const PERMILLE: i32 = 1000;

/// Animation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnimationError {
    /// Track id beyond [`MAX_ANIMATIONS`]
    BadId(AnimationId),
    /// Track already holds [`MAX_KEYFRAMES`] keyframes
    TrackFull(AnimationId),
}

/// One keyframe; `easing` shapes the curve towards the next keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Keyframe {
    pub time_ms: u16,
    pub value: i16,
    pub easing: Easing,
}

#[derive(Debug, Clone, Default)]
struct Track {
    keyframes: Vec<Keyframe, MAX_KEYFRAMES>,
    mode: LoopMode,
    playing: bool,
    /// Time since start, already folded into one period
    elapsed_ms: u32,
}

impl Track {
    fn duration(&self) -> u32 {
        self.keyframes.last().map(|k| k.time_ms as u32).unwrap_or(0)
    }

    fn cursor(&self) -> u32 {
        let d = self.duration();
        match self.mode {
            _ if d == 0 => 0,
            LoopMode::Once => self.elapsed_ms.min(d),
            LoopMode::Loop => self.elapsed_ms % d,
            LoopMode::PingPong => {
                let phase = self.elapsed_ms % (2 * d);
                if phase <= d {
                    phase
                } else {
                    2 * d - phase
                }
            }
        }
    }

    fn advance(&mut self, delta_ms: u32) {
        if !self.playing {
            return;
        }
        let d = self.duration();
        let elapsed = self.elapsed_ms.saturating_add(delta_ms);
        match self.mode {
            LoopMode::Once => {
                self.elapsed_ms = elapsed.min(d);
                if elapsed >= d {
                    self.playing = false;
                }
            }
            _ if d == 0 => self.elapsed_ms = 0,
            LoopMode::Loop => self.elapsed_ms = elapsed % d,
            LoopMode::PingPong => self.elapsed_ms = elapsed % (2 * d),
        }
    }

    fn sample(&self) -> Option<i16> {
        let first = self.keyframes.first()?;
        let cursor = self.cursor();
        if cursor <= first.time_ms as u32 {
            return Some(first.value);
        }

        let next = self
            .keyframes
            .iter()
            .position(|k| k.time_ms as u32 > cursor);
        let Some(i) = next else {
            return self.keyframes.last().map(|k| k.value);
        };

        let (a, b) = (self.keyframes[i - 1], self.keyframes[i]);
        let span = (b.time_ms - a.time_ms) as i32;
        let t = (cursor as i32 - a.time_ms as i32) * PERMILLE / span;
        let eased = ease(a.easing, t);
        let delta = b.value as i32 - a.value as i32;
        Some((a.value as i32 + delta * eased / PERMILLE) as i16)
    }
}

/// Apply an easing curve to progress `t` in permille
pub fn ease(easing: Easing, t: i32) -> i32 {
    let t = t.clamp(0, PERMILLE);
    let inv = PERMILLE - t;
    match easing {
        Easing::Linear => t,
        Easing::EaseIn => t * t / PERMILLE,
        Easing::EaseOut => PERMILLE - inv * inv / PERMILLE,
        Easing::EaseInOut if t < PERMILLE / 2 => 2 * t * t / PERMILLE,
        Easing::EaseInOut => PERMILLE - 2 * inv * inv / PERMILLE,
        Easing::Step => 0,
    }
}

/// All animation tracks
#[derive(Debug, Clone, Default)]
pub struct Animations {
    tracks: [Track; MAX_ANIMATIONS],
}

impl Animations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keyframe, keeping the track sorted by time
    ///
    /// A keyframe at an existing time replaces it.
    pub fn add_keyframe(&mut self, id: AnimationId, keyframe: Keyframe) -> Result<(), AnimationError> {
        let track = self.track_mut(id)?;
        let keyframes = &mut track.keyframes;
        match keyframes.binary_search_by_key(&keyframe.time_ms, |k| k.time_ms) {
            Ok(i) => keyframes[i] = keyframe,
            Err(i) => keyframes
                .insert(i, keyframe)
                .map_err(|_| AnimationError::TrackFull(id))?,
        }
        Ok(())
    }

    /// Rewind and play
    pub fn start(&mut self, id: AnimationId, mode: LoopMode) -> Result<(), AnimationError> {
        let track = self.track_mut(id)?;
        track.mode = mode;
        track.elapsed_ms = 0;
        track.playing = true;
        Ok(())
    }

    /// Halt at the current cursor
    pub fn stop(&mut self, id: AnimationId) -> Result<(), AnimationError> {
        self.track_mut(id)?.playing = false;
        Ok(())
    }

    /// Advance every playing track
    pub fn tick(&mut self, delta_ms: u32) {
        self.tracks.iter_mut().for_each(|t| t.advance(delta_ms));
    }

    /// Interpolated value at the cursor, `None` for an empty track
    pub fn sample(&self, id: AnimationId) -> Option<i16> {
        self.tracks.get(id as usize)?.sample()
    }

    pub fn is_playing(&self, id: AnimationId) -> bool {
        self.tracks.get(id as usize).is_some_and(|t| t.playing)
    }

    /// Cursor position in milliseconds
    pub fn cursor_ms(&self, id: AnimationId) -> Option<u32> {
        self.tracks.get(id as usize).map(Track::cursor)
    }

    /// Ids of tracks that currently have keyframes
    pub fn active_ids(&self) -> impl Iterator<Item = AnimationId> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.keyframes.is_empty())
            .map(|(i, _)| i as AnimationId)
    }

    /// Drop every keyframe and stop every track
    pub fn clear(&mut self) {
        self.tracks = Default::default();
    }

    fn track_mut(&mut self, id: AnimationId) -> Result<&mut Track, AnimationError> {
        self.tracks
            .get_mut(id as usize)
            .ok_or(AnimationError::BadId(id))
    }
}
