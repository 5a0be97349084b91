use std::{
    os::unix::process::ExitStatusExt,
    process::{Command, Output},
};

use anyhow::{anyhow, bail, Context, Error};
use log::trace;

use crate::crate_private::Sealed;

/// Extension for `std::process::Output` to check the exit status and turn
/// failures into errors carrying the captured output.
/// This is a sealed trait, so it cannot be implemented outside of this crate.
pub trait OutputChecker: Sealed {
    fn is_success(&self) -> bool;

    /// Exit code, if the process exited normally.
    fn exit_code(&self) -> Option<i32>;

    /// Signal that terminated the process, if any.
    fn end_signal(&self) -> Option<i32>;

    fn output(&self) -> String {
        "".into()
    }

    fn error_output(&self) -> String {
        "".into()
    }

    /// stdout and stderr in one report, for logs and error messages.
    fn output_report(&self) -> String {
        let stdout = self.output();
        let stderr = self.error_output();

        let mut res = String::with_capacity(stdout.len() + stderr.len() + 20);
        if !stdout.is_empty() {
            res += &format!("stdout:\n{}\n", stdout);
        }
        if !stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{}\n", stderr);
        }
        res
    }

    fn check(&self) -> Result<(), Error> {
        if self.is_success() {
            return Ok(());
        }

        Err(match self.output_report() {
            s if !s.is_empty() => anyhow!("Process output:\n{}", s).context(self.explain_exit()),
            _ => anyhow!("(No output was captured)").context(self.explain_exit()),
        })
    }

    fn explain_exit(&self) -> String {
        if let Some(code) = self.exit_code() {
            format!("process exited with status: {code}")
        } else if let Some(signal) = self.end_signal() {
            format!("process was terminated by signal: {signal}")
        } else {
            "process exited with unknown status".into()
        }
    }
}

impl Sealed for Output {}

impl OutputChecker for Output {
    fn is_success(&self) -> bool {
        self.status.success()
    }

    fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }

    fn end_signal(&self) -> Option<i32> {
        self.status.signal()
    }

    fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into()
    }

    fn output(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into()
    }
}

pub trait RunAndCheck: Sealed {
    /// Runs the command, failing unless it exits successfully.
    fn run_and_check(&mut self) -> Result<(), Error>;

    /// Runs the command and returns its stdout, failing unless it exits
    /// successfully.
    fn output_and_check(&mut self) -> Result<String, Error>;

    /// The command line as it would be typed in a shell.
    fn render_command(&self) -> String;
}

impl Sealed for Command {}

impl RunAndCheck for Command {
    fn run_and_check(&mut self) -> Result<(), Error> {
        self.output_and_check().map(|_| ())
    }

    fn output_and_check(&mut self) -> Result<String, Error> {
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");
        let output = match self.output() {
            Ok(output) => output,
            Err(e) => bail!("Failed to execute '{rendered_command}': {e}"),
        };
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );
        output
            .check()
            .with_context(|| format!("Error when running: {rendered_command}"))?;
        Ok(output.output())
    }

    fn render_command(&self) -> String {
        let program = self.get_program().to_string_lossy();
        let args = self
            .get_args()
            .map(|arg| arg.to_string_lossy())
            .map(|arg| {
                if arg.contains(' ') {
                    format!("'{}'", arg)
                } else {
                    arg.into()
                }
            })
            .collect::<Vec<_>>();

        if args.is_empty() {
            program.into()
        } else {
            format!("{} {}", program, args.join(" "))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_output_checker() {
        let output = Command::new("echo").arg("something").output().unwrap();
        assert!(output.is_success());
        assert_eq!(output.exit_code(), Some(0));
        assert_eq!(output.end_signal(), None);
        assert_eq!(output.output(), "something\n");
        assert_eq!(output.explain_exit(), "process exited with status: 0");
        output.check().unwrap();

        let output = Command::new("bash")
            .arg("-c")
            .arg("echo oops >&2; exit 3")
            .output()
            .unwrap();
        assert!(!output.is_success());
        assert_eq!(output.exit_code(), Some(3));
        assert_eq!(output.output_report(), "stderr:\noops\n\n");
        let err = output.check().unwrap_err();
        assert_eq!(err.to_string(), "process exited with status: 3");
    }

    #[test]
    fn test_output_and_check() {
        let mut cmd = Command::new("echo");
        cmd.arg("something");
        assert_eq!(cmd.output_and_check().unwrap(), "something\n");

        Command::new("nonexistent_command_1234")
            .arg("/nonexistent")
            .run_and_check()
            .unwrap_err();

        Command::new("cat")
            .arg("/nonexistent_file_1234")
            .run_and_check()
            .unwrap_err();
    }

    #[test]
    fn test_render_command() {
        assert_eq!(Command::new("sync").render_command(), "sync");

        let mut cmd = Command::new("mkfs.ext4");
        cmd.arg("-L").arg("my data").arg("/dev/sda1");
        assert_eq!(cmd.render_command(), "mkfs.ext4 -L 'my data' /dev/sda1");
    }
}
