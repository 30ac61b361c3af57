//! An ordered list of stages plus the decision points hung off them, and the
//! static checks that can be made before anything runs.

use std::collections::HashSet;
use std::fmt;

use blogsmith_shared::{BlogsmithError, Result};

use crate::context::PipelineContext;
use crate::stage::StageSpec;

/// A pure function evaluated once, right after stage `after` completes. Its
/// output is stored in the context under `key`.
#[derive(Debug, Clone)]
pub struct DecisionPoint {
    pub key: &'static str,
    pub after: &'static str,
    pub decide: fn(&PipelineContext) -> String,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    stages: Vec<StageSpec>,
    decisions: Vec<DecisionPoint>,
}

impl Pipeline {
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self {
            stages,
            decisions: Vec::new(),
        }
    }

    pub fn with_decision(mut self, decision: DecisionPoint) -> Self {
        self.decisions.push(decision);
        self
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn decisions(&self) -> &[DecisionPoint] {
        &self.decisions
    }

    /// Decision points attached to `stage`, in registration order.
    pub fn decisions_after<'a>(
        &'a self,
        stage: &'a str,
    ) -> impl Iterator<Item = &'a DecisionPoint> + 'a {
        self.decisions.iter().filter(move |d| d.after == stage)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Check the whole pipeline and collect every problem found.
    pub fn validate(&self) -> ValidationReport {
        let mut issues = Vec::new();
        if self.stages.is_empty() {
            issues.push(ValidationIssue::Empty);
        }

        let all: HashSet<&str> = self.stages.iter().map(|s| s.name).collect();
        let mut earlier: HashSet<&str> = HashSet::new();

        for stage in &self.stages {
            if earlier.contains(stage.name) {
                issues.push(ValidationIssue::DuplicateStage { stage: stage.name });
            }
            for &req in stage.requires {
                if req == stage.name {
                    issues.push(ValidationIssue::SelfRequirement { stage: stage.name });
                } else if earlier.contains(req) {
                    continue;
                } else if all.contains(req) {
                    issues.push(ValidationIssue::ForwardRequirement {
                        stage: stage.name,
                        requires: req,
                    });
                } else {
                    issues.push(ValidationIssue::UnknownRequirement {
                        stage: stage.name,
                        requires: req,
                    });
                }
            }
            earlier.insert(stage.name);
        }

        for decision in &self.decisions {
            if !all.contains(decision.after) {
                issues.push(ValidationIssue::DecisionAfterUnknownStage {
                    key: decision.key,
                    after: decision.after,
                });
            }
        }

        ValidationReport { issues }
    }
}

/// One problem found by [`Pipeline::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    Empty,
    DuplicateStage { stage: &'static str },
    SelfRequirement { stage: &'static str },
    ForwardRequirement { stage: &'static str, requires: &'static str },
    UnknownRequirement { stage: &'static str, requires: &'static str },
    DecisionAfterUnknownStage { key: &'static str, after: &'static str },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("pipeline has no stages"),
            Self::DuplicateStage { stage } => write!(f, "stage `{stage}` is declared twice"),
            Self::SelfRequirement { stage } => write!(f, "stage `{stage}` requires itself"),
            Self::ForwardRequirement { stage, requires } => {
                write!(f, "stage `{stage}` requires `{requires}`, which runs later")
            }
            Self::UnknownRequirement { stage, requires } => {
                write!(f, "stage `{stage}` requires unknown stage `{requires}`")
            }
            Self::DecisionAfterUnknownStage { key, after } => {
                write!(f, "decision `{key}` is attached to unknown stage `{after}`")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// `Err(Validation)` listing every issue, or `Ok` when there are none.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            return Ok(());
        }
        let joined = self
            .issues
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(BlogsmithError::validation(format!("invalid pipeline: {joined}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::{StageOutput, StagePlan};
    use blogsmith_extract::Contract;
    use serde_json::Value;

    fn plan(_: &PipelineContext) -> StagePlan {
        StagePlan::Generate {
            prompt: String::new(),
        }
    }

    fn finish(_: &StageOutput<'_>, _: &PipelineContext) -> Value {
        Value::Null
    }

    fn stage(name: &'static str, requires: &'static [&'static str]) -> StageSpec {
        StageSpec::new(name, Contract::object(), plan, finish).requires(requires)
    }

    fn decide(_: &PipelineContext) -> String {
        String::new()
    }

    #[test]
    fn valid_pipeline_has_no_issues() {
        let pipeline = Pipeline::new(vec![stage("a", &[]), stage("b", &["a"])]).with_decision(
            DecisionPoint {
                key: "topic",
                after: "a",
                decide,
            },
        );
        assert!(pipeline.validate().is_ok());
        assert!(pipeline.validate().into_result().is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let pipeline = Pipeline::new(vec![
            stage("a", &["b"]),
            stage("b", &["b", "ghost"]),
            stage("a", &[]),
        ])
        .with_decision(DecisionPoint {
            key: "topic",
            after: "nowhere",
            decide,
        });

        let report = pipeline.validate();
        assert_eq!(
            report.issues,
            vec![
                ValidationIssue::ForwardRequirement {
                    stage: "a",
                    requires: "b"
                },
                ValidationIssue::SelfRequirement { stage: "b" },
                ValidationIssue::UnknownRequirement {
                    stage: "b",
                    requires: "ghost"
                },
                ValidationIssue::DuplicateStage { stage: "a" },
                ValidationIssue::DecisionAfterUnknownStage {
                    key: "topic",
                    after: "nowhere"
                },
            ]
        );

        let err = report.into_result().unwrap_err().to_string();
        assert!(err.contains("runs later"));
        assert!(err.contains("unknown stage `ghost`"));
    }

    #[test]
    fn empty_pipeline_is_invalid() {
        assert_eq!(Pipeline::default().validate().issues, vec![ValidationIssue::Empty]);
    }
}
