//! Barrier command implementation.

use segsync_drv::{BarrierParams, BarrierReport};

use crate::commands::common::{emit, require_positive, RunContext};
use crate::commands::traits::Command;
use crate::error::Result;

/// Arguments for the barrier command.
#[derive(Debug, Clone)]
pub struct BarrierArgs {
    pub params: BarrierParams,
    pub context: RunContext,
}

/// Barrier command handler.
pub struct BarrierCommand {
    args: BarrierArgs,
}

impl Command for BarrierCommand {
    type Args = BarrierArgs;
    type Output = BarrierReport;

    fn new(args: BarrierArgs) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<BarrierReport> {
        let params = &self.args.params;
        require_positive(params.workers, "workers")?;

        tracing::info!(
            workers = params.workers,
            phases = params.phases,
            "starting {} demo",
            Self::name()
        );
        let controller = self.args.context.controller()?;
        Ok(controller.run_barrier(params)?)
    }

    fn name() -> &'static str {
        "barrier"
    }
}

/// Run the barrier demo and print its report.
pub fn run_barrier(args: BarrierArgs) -> Result<()> {
    let json = args.context.options.json;
    let report = BarrierCommand::new(args).execute()?;
    emit(&report, json, &report.violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::RunOptions;
    use segsync::SyncConfig;
    use segsync_drv::WorkRange;

    #[test]
    fn test_barrier_execute() {
        let args = BarrierArgs {
            params: BarrierParams {
                workers: 3,
                phases: 4,
                work: WorkRange::NONE,
            },
            context: RunContext {
                sync: SyncConfig::default(),
                options: RunOptions::default(),
                verbose: false,
            },
        };
        let report = BarrierCommand::new(args).execute().unwrap();
        assert_eq!(report.phases_completed, 4);
        assert_eq!(report.participant_phases, vec![4, 4, 4]);
    }
}
