/*!
 * Index of the most recent end frame produced for each shot.
 *
 * The batch scheduler reads from this index to hand a predecessor's end frame
 * to an inheriting shot, and writes to it whenever a shot produces a new one.
 */

use std::collections::HashMap;

use crate::production::ShotId;

#[derive(Debug, Clone, Default)]
pub struct FrameIndex {
    end_frames: HashMap<ShotId, String>,
}

impl FrameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from end frames recorded by an earlier, partial run
    pub fn seeded<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = (ShotId, String)>,
    {
        Self {
            end_frames: frames.into_iter().collect(),
        }
    }

    /// Record a new end frame, returning the one it replaced
    pub fn record(&mut self, shot_id: &str, end_frame_url: &str) -> Option<String> {
        self.end_frames
            .insert(shot_id.to_string(), end_frame_url.to_string())
    }

    pub fn end_frame(&self, shot_id: &str) -> Option<&str> {
        self.end_frames.get(shot_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.end_frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.end_frames.is_empty()
    }
}
