//! Stage tracking for a single deployment attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::deployment::{Deployment, DeploymentStatus};
use crate::error::{DeployError, DeployResult};

/// Where an attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// The deployment record exists, nothing has run yet.
    Created,
    /// The compose source was fetched or written.
    SourceAcquired,
    /// The stack is up or the container replaced.
    Built,
    Done,
    Error,
}

impl Stage {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Rebuilds go straight from `Created` to `Built`. Any
    /// non-terminal stage may fail.
    #[must_use]
    pub const fn can_advance(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Created, Self::SourceAcquired | Self::Built)
                | (Self::SourceAcquired, Self::Built)
                | (Self::Built, Self::Done)
                | (Self::Created | Self::SourceAcquired | Self::Built, Self::Error)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::SourceAcquired => "source-acquired",
            Self::Built => "built",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// Ordered record of the stages an attempt went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    stages: Vec<Stage>,
}

impl Attempt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: vec![Stage::Created],
        }
    }

    #[must_use]
    pub fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Created)
    }

    pub fn advance(&mut self, to: Stage) -> DeployResult<()> {
        let from = self.current();
        if !from.can_advance(to) {
            return Err(DeployError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.stages.push(to);
        Ok(())
    }

    /// Close the attempt: `Done` when `succeeded` and the build
    /// finished, `Error` otherwise.
    pub fn finish(&mut self, succeeded: bool) -> Stage {
        let last = if succeeded && self.current() == Stage::Built {
            Stage::Done
        } else {
            Stage::Error
        };
        if !self.current().is_terminal() {
            self.stages.push(last);
        }
        self.current()
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new()
    }
}

/// What an attempt produced, before any status is written.
#[derive(Debug)]
pub struct Outcome {
    pub deployment: Deployment,
    pub stages: Vec<Stage>,
    pub result: DeployResult<()>,
}

impl Outcome {
    /// Terminal status to persist for this attempt.
    #[must_use]
    pub fn status(&self) -> DeploymentStatus {
        match self.stages.last() {
            Some(Stage::Done) if self.result.is_ok() => DeploymentStatus::Done,
            _ => DeploymentStatus::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_path() {
        let mut attempt = Attempt::new();
        attempt.advance(Stage::SourceAcquired).unwrap();
        attempt.advance(Stage::Built).unwrap();

        assert_eq!(attempt.finish(true), Stage::Done);
        assert_eq!(
            attempt.stages(),
            &[Stage::Created, Stage::SourceAcquired, Stage::Built, Stage::Done]
        );
    }

    #[test]
    fn rebuild_skips_source() {
        let mut attempt = Attempt::new();
        attempt.advance(Stage::Built).unwrap();
        assert_eq!(attempt.finish(true), Stage::Done);
    }

    #[test]
    fn cannot_skip_the_build() {
        let mut attempt = Attempt::new();
        let err = attempt.advance(Stage::Done).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid state transition: created -> done"
        );
        assert_eq!(attempt.current(), Stage::Created);
    }

    #[test]
    fn failure_before_build_ends_in_error() {
        let mut attempt = Attempt::new();
        attempt.advance(Stage::SourceAcquired).unwrap();

        assert_eq!(attempt.finish(false), Stage::Error);
        // Reporting success afterwards changes nothing.
        assert_eq!(attempt.finish(true), Stage::Error);
        assert_eq!(attempt.stages().len(), 3);
    }

    #[test]
    fn success_without_build_is_an_error() {
        let mut attempt = Attempt::new();
        assert_eq!(attempt.finish(true), Stage::Error);
    }

    #[test]
    fn terminal_stages_are_frozen() {
        for terminal in [Stage::Done, Stage::Error] {
            for next in [
                Stage::Created,
                Stage::SourceAcquired,
                Stage::Built,
                Stage::Done,
                Stage::Error,
            ] {
                assert!(!terminal.can_advance(next), "{terminal} -> {next}");
            }
        }
    }
}
