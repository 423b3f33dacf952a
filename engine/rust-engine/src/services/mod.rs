use std::sync::Arc;

use crate::clock::{SystemTimeSource, TimeSource};
use crate::config::EngineConfig;
use crate::persistence::PersistenceGateway;
use crate::services::assessment_client::{AssessmentSource, ResultsSink};
use crate::services::scoring::{AdditiveMarking, MarkingScheme};

/// Everything an attempt session needs wired in: configuration, the snapshot
/// gateway, the collaborators, and the marking scheme. The embedding builds
/// one of these and opens sessions against it.
pub struct EngineState {
    pub config: EngineConfig,
    pub time: Arc<dyn TimeSource>,
    pub gateway: Arc<dyn PersistenceGateway>,
    pub assessments: Arc<dyn AssessmentSource>,
    pub results: Arc<dyn ResultsSink>,
    pub marking: Arc<dyn MarkingScheme>,
}

impl EngineState {
    pub fn new(
        config: EngineConfig,
        gateway: Arc<dyn PersistenceGateway>,
        assessments: Arc<dyn AssessmentSource>,
        results: Arc<dyn ResultsSink>,
    ) -> Self {
        Self {
            config,
            time: Arc::new(SystemTimeSource),
            gateway,
            assessments,
            results,
            marking: Arc::new(AdditiveMarking),
        }
    }

    /// Swap the wall clock; tests use `ManualTimeSource` here.
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    /// Swap the default additive-only marking for another scheme.
    pub fn with_marking_scheme(mut self, marking: Arc<dyn MarkingScheme>) -> Self {
        self.marking = marking;
        self
    }
}

pub mod answer_store;
pub mod assessment_client;
pub mod attempt_session;
pub mod integrity_monitor;
pub mod runner;
pub mod scoring;
