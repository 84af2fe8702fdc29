/*!
 * Shot generation: the end-frame index and the sequential batch scheduler.
 */

pub mod batch;
pub mod frames;

pub use batch::{
    BatchGenerationScheduler, BatchReport, ShotAttempt, ShotGenerator, ShotResult, ShotWorkItem,
};
pub use frames::FrameIndex;
