use serde::Serialize;

/// Progress of one car through the inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStage {
    Created,
    GrayGate,
    Detecting,
    Classified,
    Responded,
    Persisted,
    Errored,
}

/// Ordered record of the stages a car went through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageTrace {
    stages: Vec<InspectionStage>,
}

impl StageTrace {
    pub fn new() -> Self {
        Self {
            stages: vec![InspectionStage::Created],
        }
    }

    pub fn enter(&mut self, stage: InspectionStage) {
        self.stages.push(stage);
    }

    pub fn reached(&self, stage: InspectionStage) -> bool {
        self.stages.contains(&stage)
    }

    pub fn last(&self) -> Option<InspectionStage> {
        self.stages.last().copied()
    }

    pub fn stages(&self) -> &[InspectionStage] {
        &self.stages
    }
}
