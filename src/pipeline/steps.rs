/*!
 * The fixed step sequence of a generation job.
 */

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::production::GenerationSettings;

/// One step of the pipeline, numbered as stored on the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Atmosphere,
    /// Taken from the settings at job creation, never executed
    VisualWorld,
    FlowDesign,
    Composition,
    Soundscape,
    Preview,
    Export,
    Publish,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 8] = [
        PipelineStep::Atmosphere,
        PipelineStep::VisualWorld,
        PipelineStep::FlowDesign,
        PipelineStep::Composition,
        PipelineStep::Soundscape,
        PipelineStep::Preview,
        PipelineStep::Export,
        PipelineStep::Publish,
    ];

    pub fn number(&self) -> u8 {
        match self {
            PipelineStep::Atmosphere => 1,
            PipelineStep::VisualWorld => 2,
            PipelineStep::FlowDesign => 3,
            PipelineStep::Composition => 4,
            PipelineStep::Soundscape => 5,
            PipelineStep::Preview => 6,
            PipelineStep::Export => 7,
            PipelineStep::Publish => 8,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|step| step.number() == number)
    }

    /// Key the step's output is persisted under
    pub fn key(&self) -> &'static str {
        match self {
            PipelineStep::Atmosphere => "atmosphere",
            PipelineStep::VisualWorld => "visual_world",
            PipelineStep::FlowDesign => "flow_design",
            PipelineStep::Composition => "composition",
            PipelineStep::Soundscape => "soundscape",
            PipelineStep::Preview => "preview",
            PipelineStep::Export => "export",
            PipelineStep::Publish => "publish",
        }
    }

    pub fn is_executed(&self) -> bool {
        *self != PipelineStep::VisualWorld
    }

    /// Failures of this step never fail the job
    pub fn is_best_effort(&self) -> bool {
        *self == PipelineStep::Publish
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStep::Atmosphere => "Atmosphere",
            PipelineStep::VisualWorld => "Visual World",
            PipelineStep::FlowDesign => "Flow Design",
            PipelineStep::Composition => "Composition",
            PipelineStep::Soundscape => "Soundscape",
            PipelineStep::Preview => "Preview",
            PipelineStep::Export => "Export",
            PipelineStep::Publish => "Publish",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for PipelineStep {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.parse::<u8>() {
            return Self::from_number(number).ok_or_else(|| anyhow!("Invalid step number: {}", s));
        }
        let wanted = s.to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|step| step.key() == wanted)
            .ok_or_else(|| anyhow!("Invalid step: {}", s))
    }
}

/// The steps a job executes, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<PipelineStep>,
}

impl ExecutionPlan {
    pub fn for_settings(settings: &GenerationSettings) -> Self {
        let steps = PipelineStep::ALL
            .iter()
            .copied()
            .filter(|step| step.is_executed())
            .filter(|step| *step != PipelineStep::Publish || settings.publish.enabled)
            .collect();
        Self { steps }
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn first(&self) -> PipelineStep {
        self.steps.first().copied().unwrap_or(PipelineStep::Atmosphere)
    }

    pub fn contains(&self, step: PipelineStep) -> bool {
        self.steps.contains(&step)
    }

    /// Step numbers that must be completed before `step` can run
    pub fn prerequisites(&self, step: PipelineStep) -> Vec<u8> {
        self.steps
            .iter()
            .filter(|s| **s < step)
            .map(PipelineStep::number)
            .collect()
    }

    /// `step` and every step after it
    pub fn from_step(&self, step: PipelineStep) -> Vec<PipelineStep> {
        self.steps.iter().copied().filter(|s| *s >= step).collect()
    }

    pub fn next_after(&self, step: PipelineStep) -> Option<PipelineStep> {
        self.steps.iter().copied().find(|s| *s > step)
    }

    /// Validate a resume point given as a step number
    pub fn resume_point(&self, number: u8) -> Result<PipelineStep> {
        let step = PipelineStep::from_number(number)
            .ok_or_else(|| anyhow!("Invalid step number: {}", number))?;
        if !self.contains(step) {
            return Err(anyhow!("Step {} ({}) is not executed for this job", number, step));
        }
        Ok(step)
    }
}
