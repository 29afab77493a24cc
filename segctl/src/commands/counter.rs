//! Counter command implementation.
//!
//! Races workers on the regular and atomic counters and reports how many
//! increments each one kept.

use segsync_drv::{CounterParams, CounterReport};

use crate::commands::common::{emit, require_positive, RunContext};
use crate::commands::traits::Command;
use crate::error::Result;

/// Arguments for the counter command.
#[derive(Debug, Clone)]
pub struct CounterArgs {
    pub params: CounterParams,
    pub context: RunContext,
}

/// Counter command handler.
pub struct CounterCommand {
    args: CounterArgs,
}

impl Command for CounterCommand {
    type Args = CounterArgs;
    type Output = CounterReport;

    fn new(args: CounterArgs) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<CounterReport> {
        let params = &self.args.params;
        require_positive(params.workers, "workers")?;

        tracing::info!(
            workers = params.workers,
            increments = params.increments,
            mode = ?params.mode,
            "starting {} demo",
            Self::name()
        );
        let controller = self.args.context.controller()?;
        Ok(controller.run_counter(params)?)
    }

    fn name() -> &'static str {
        "counter"
    }
}

/// Run the counter demo and print its report.
pub fn run_counter(args: CounterArgs) -> Result<()> {
    let json = args.context.options.json;
    let report = CounterCommand::new(args).execute()?;

    if let Some(regular) = &report.regular {
        if regular.lost > 0 {
            tracing::info!("regular counter lost {} updates", regular.lost);
        }
    }
    emit(&report, json, &report.violations)
}
