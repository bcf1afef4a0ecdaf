use crate::track::Track;

/// Ordered tracks plus the current-position pointer.
///
/// `current_index` is `None` when nothing is selected. Navigation clamps at
/// both ends; there is no wraparound.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tracks: Vec<Track>,
    current_index: Option<usize>,
}

impl Queue {
    pub fn new() -> Self {
        Queue::default()
    }

    /// Replace every track. The pointer follows the current track when it
    /// is still present, otherwise nothing is selected.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        let current_id = self.current().map(|t| t.id.clone());
        self.tracks = tracks;
        self.current_index = current_id.and_then(|id| self.position_of(&id));
    }

    /// Append a track. Returns its index.
    pub fn push(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    /// Index of the first track with this id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Point at `index`. Returns false (and leaves the pointer) when out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.tracks.len() {
            return false;
        }
        self.current_index = Some(index);
        true
    }

    /// Move forward one entry. Returns false at the end.
    pub fn advance(&mut self) -> bool {
        match self.current_index {
            Some(ci) if ci + 1 < self.tracks.len() => {
                self.current_index = Some(ci + 1);
                true
            }
            _ => false,
        }
    }

    /// Move back one entry. Returns false at the start.
    pub fn retreat(&mut self) -> bool {
        match self.current_index {
            Some(ci) if ci > 0 => {
                self.current_index = Some(ci - 1);
                true
            }
            _ => false,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_index
            .is_some_and(|ci| ci + 1 < self.tracks.len())
    }

    pub fn current(&self) -> Option<&Track> {
        self.current_index.and_then(|ci| self.tracks.get(ci))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
