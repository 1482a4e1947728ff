//! Per-tile validation and playback state.
//!
//! A tile validates its URLs when it mounts and whenever the item it shows changes. Resolution
//! is async, so each validation gets a ticket; completions carrying an outdated ticket are
//! dropped instead of overwriting newer state.

use crate::config::DEFAULT_VISIBILITY_THRESHOLD;
use crate::resolver::Resolution;
use folio_core::MediaItem;
use folio_types::{FolderKey, MediaKind};

/// What the tile currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileState {
    Unvalidated,
    Validating,
    Ready(Resolution),
}

/// Proof that a validation was started for a particular generation of the tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationTicket {
    generation: u64,
}

/// Fields that make two renderings of a tile "the same item".
#[derive(Debug, Clone, PartialEq, Eq)]
struct TileIdentity {
    folder: FolderKey,
    preview_url: String,
    full_url: String,
}

impl TileIdentity {
    fn of(item: &MediaItem) -> Self {
        Self {
            folder: item.folder.clone(),
            preview_url: item.preview_url.clone(),
            full_url: item.full_url.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileSlot {
    identity: Option<TileIdentity>,
    generation: u64,
    state: TileState,
    is_video: bool,
    visibility: f32,
    threshold: f32,
    recovery_used: bool,
}

impl Default for TileSlot {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_THRESHOLD)
    }
}

impl TileSlot {
    pub fn new(threshold: f32) -> Self {
        Self {
            identity: None,
            generation: 0,
            state: TileState::Unvalidated,
            is_video: false,
            visibility: 0.0,
            threshold: threshold.clamp(0.0, 1.0),
            recovery_used: false,
        }
    }

    pub fn state(&self) -> &TileState {
        &self.state
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match &self.state {
            TileState::Ready(r) => Some(r),
            _ => None,
        }
    }

    /// Starts validation for `item` if this is a mount or the identity changed.
    ///
    /// Returns `None` when the tile already shows (or is validating) the same item.
    pub fn begin(&mut self, item: &MediaItem) -> Option<ValidationTicket> {
        let identity = TileIdentity::of(item);
        let same = self.identity.as_ref() == Some(&identity);
        if same && self.state != TileState::Unvalidated {
            return None;
        }

        self.generation += 1;
        self.identity = Some(identity);
        self.is_video =
            item.preview_type == MediaKind::Video || item.full_type == MediaKind::Video;
        self.state = TileState::Validating;
        if !same {
            self.recovery_used = false;
        }
        Some(ValidationTicket {
            generation: self.generation,
        })
    }

    /// Applies a finished validation. Returns `false` if the ticket is stale.
    pub fn complete(&mut self, ticket: ValidationTicket, resolution: Resolution) -> bool {
        if ticket.generation != self.generation {
            return false;
        }
        self.state = TileState::Ready(resolution);
        true
    }

    /// Drops the tile. In-flight validations become stale.
    pub fn unmount(&mut self) {
        self.generation += 1;
        self.identity = None;
        self.state = TileState::Unvalidated;
        self.visibility = 0.0;
        self.recovery_used = false;
    }

    /// Records the visible fraction of the tile, clamped to `0.0..=1.0`.
    pub fn set_visibility(&mut self, ratio: f32) {
        self.visibility = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
    }

    /// Video tiles play only once validated and while visible enough.
    pub fn should_play(&self) -> bool {
        self.is_video
            && matches!(self.state, TileState::Ready(ref r) if r.is_resolved())
            && self.visibility >= self.threshold
    }

    /// Claims the single playback recovery allowed per item and mount.
    pub fn take_recovery(&mut self) -> bool {
        if self.recovery_used || self.identity.is_none() {
            return false;
        }
        self.recovery_used = true;
        true
    }
}
