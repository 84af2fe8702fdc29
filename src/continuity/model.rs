/*!
 * Continuity group types and the per-shot inheritance record.
 */

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::ContinuityIssue;
use crate::production::{SceneId, ShotId};

/// Maximum number of shots a continuity group may chain together
pub const MAX_GROUP_SHOTS: usize = 5;

/// Minimum number of shots a continuity group needs
pub const MIN_GROUP_SHOTS: usize = 2;

/// How the frame boundary between grouped shots is meant to connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionType {
    #[default]
    Seamless,
    MatchCut,
    CameraContinuation,
    MotionContinuation,
    LightShift,
}

impl TransitionType {
    /// Parse a label, falling back to the default for anything unrecognized
    pub fn parse_or_default(label: &str) -> Self {
        label.parse().unwrap_or_default()
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionType::Seamless => write!(f, "seamless"),
            TransitionType::MatchCut => write!(f, "match-cut"),
            TransitionType::CameraContinuation => write!(f, "camera-continuation"),
            TransitionType::MotionContinuation => write!(f, "motion-continuation"),
            TransitionType::LightShift => write!(f, "light-shift"),
        }
    }
}

impl std::str::FromStr for TransitionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "seamless" => Ok(TransitionType::Seamless),
            "match-cut" => Ok(TransitionType::MatchCut),
            "camera-continuation" => Ok(TransitionType::CameraContinuation),
            "motion-continuation" => Ok(TransitionType::MotionContinuation),
            "light-shift" => Ok(TransitionType::LightShift),
            _ => Err(anyhow::anyhow!("Invalid transition type: {}", s)),
        }
    }
}

/// Review status of a continuity group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Proposed,
    Approved,
}

/// A continuity group as proposed, before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedGroup {
    pub id: String,
    pub scene_id: SceneId,
    pub shot_ids: Vec<ShotId>,
    /// Free-form label; unknown labels become the default transition
    pub transition: String,
    pub status: GroupStatus,
}

/// A continuity group that passed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityGroup {
    pub id: String,
    pub scene_id: SceneId,
    /// 2-5 ids whose shot numbers are strictly consecutive
    pub shot_ids: Vec<ShotId>,
    pub transition: TransitionType,
    pub status: GroupStatus,
}

impl ContinuityGroup {
    pub fn is_approved(&self) -> bool {
        self.status == GroupStatus::Approved
    }
}

/// How a single shot obtains its start frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inheritance {
    pub group_id: Option<String>,
    /// True when the shot generates its own start frame
    pub is_first: bool,
    /// Shot whose end frame becomes this shot's start frame
    pub previous_shot_id: Option<ShotId>,
}

impl Inheritance {
    /// A shot that is not part of any chain
    pub fn independent() -> Self {
        Self {
            group_id: None,
            is_first: true,
            previous_shot_id: None,
        }
    }

    pub fn inherits(&self) -> bool {
        !self.is_first && self.previous_shot_id.is_some()
    }
}

impl Default for Inheritance {
    fn default() -> Self {
        Self::independent()
    }
}

/// A group that did not survive validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedGroup {
    pub group_id: String,
    pub issue: ContinuityIssue,
}

/// Result of resolving continuity for a whole storyboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuityResolution {
    /// Every group that passed validation, whatever its status
    pub groups: Vec<ContinuityGroup>,
    /// One entry per known shot
    pub inheritance: BTreeMap<ShotId, Inheritance>,
    pub dropped: Vec<DroppedGroup>,
}

impl ContinuityResolution {
    pub fn get(&self, shot_id: &str) -> Option<&Inheritance> {
        self.inheritance.get(shot_id)
    }

    /// Number of shots that take their start frame from a predecessor
    pub fn inheriting_count(&self) -> usize {
        self.inheritance.values().filter(|i| i.inherits()).count()
    }
}
