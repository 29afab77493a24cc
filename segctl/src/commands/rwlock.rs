//! Reader-writer lock command implementation.

use segsync_drv::{RwLockParams, RwLockReport};

use crate::commands::common::{emit, RunContext};
use crate::commands::traits::Command;
use crate::error::{CtlError, Result};

/// Arguments for the rwlock command.
#[derive(Debug, Clone)]
pub struct RwLockArgs {
    pub params: RwLockParams,
    pub context: RunContext,
}

/// Reader-writer lock command handler.
pub struct RwLockCommand {
    args: RwLockArgs,
}

impl Command for RwLockCommand {
    type Args = RwLockArgs;
    type Output = RwLockReport;

    fn new(args: RwLockArgs) -> Self {
        Self { args }
    }

    fn execute(&self) -> Result<RwLockReport> {
        let params = &self.args.params;
        if params.workers() == 0 {
            return Err(CtlError::Validation(
                "at least one reader or writer is required".to_string(),
            ));
        }

        tracing::info!(
            readers = params.readers,
            writers = params.writers,
            "starting {} demo",
            Self::name()
        );
        let controller = self.args.context.controller()?;
        let report = controller.run_rwlock(params)?;

        if report.dropped_notifications > 0 {
            tracing::debug!("{} progress notifications dropped", report.dropped_notifications);
        }
        Ok(report)
    }

    fn name() -> &'static str {
        "rwlock"
    }
}

/// Run the reader-writer lock demo and print its report.
pub fn run_rwlock(args: RwLockArgs) -> Result<()> {
    let json = args.context.options.json;
    let report = RwLockCommand::new(args).execute()?;
    emit(&report, json, &report.violations)
}
