/*!
 * Shot continuity: which shots take their start frame from the end frame of
 * the shot before them.
 */

pub mod model;
pub mod resolver;

pub use model::{
    ContinuityGroup, ContinuityResolution, DroppedGroup, GroupStatus, Inheritance, ProposedGroup,
    TransitionType,
};
pub use resolver::ContinuityResolver;
