//! The seam between planning and the running system. Every wrapper in this
//! crate runs its command through a `CommandRunner`, so the commit executor
//! can be driven against a recording double in tests.

use std::process::Command;

use anyhow::Error;

use crate::exe::RunAndCheck;

pub trait CommandRunner: Send + Sync {
    /// Runs `command` and returns its stdout. Fails when the command cannot
    /// be started or exits unsuccessfully; the error carries the captured
    /// output.
    fn run(&self, command: &mut Command) -> Result<String, Error>;
}

/// Runs commands on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &mut Command) -> Result<String, Error> {
        command.output_and_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner() {
        let runner = SystemRunner;
        assert_eq!(
            runner.run(Command::new("echo").arg("hello")).unwrap(),
            "hello\n"
        );
        runner.run(&mut Command::new("false")).unwrap_err();
    }
}
