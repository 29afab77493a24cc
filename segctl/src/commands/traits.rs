//! Command trait for the segctl CLI.

use crate::error::Result;

/// Standard shape of a segctl demo command.
pub trait Command {
    /// Resolved arguments, after config-file defaults and flag overrides.
    type Args;

    /// What a run produces.
    type Output;

    fn new(args: Self::Args) -> Self;

    /// Run the demo.
    fn execute(&self) -> Result<Self::Output>;

    /// Name used in logs and report headers.
    fn name() -> &'static str;
}
