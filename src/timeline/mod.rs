/*!
 * Timeline document and its assembler.
 */

pub mod assembler;
pub mod model;

pub use assembler::TimelineAssembler;
pub use model::{
    AudioTracks, MediaRef, TimelineDocument, TimelineScene, TimelineShot, TimelineSummary,
    TrackClip,
};
