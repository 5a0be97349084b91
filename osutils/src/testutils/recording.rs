use std::{
    process::Command,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{bail, Error};

use crate::{exe::RunAndCheck, runner::CommandRunner};

/// A `CommandRunner` that never touches the host. It records every command
/// line it is asked to run and can be told to fail or answer with canned
/// output for commands starting with a given prefix.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    failures: Mutex<Vec<String>>,
    outputs: Mutex<Vec<(String, String)>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command starting with `prefix` fails from now on.
    pub fn fail_on(&self, prefix: impl Into<String>) -> &Self {
        locked(&self.failures).push(prefix.into());
        self
    }

    /// Every command starting with `prefix` prints `output`.
    pub fn respond(&self, prefix: impl Into<String>, output: impl Into<String>) -> &Self {
        locked(&self.outputs).push((prefix.into(), output.into()));
        self
    }

    /// Command lines run so far, oldest first.
    pub fn commands(&self) -> Vec<String> {
        locked(&self.commands).clone()
    }

    /// Command lines run so far whose program is `program`.
    pub fn commands_of(&self, program: &str) -> Vec<String> {
        locked(&self.commands)
            .iter()
            .filter(|c| c.split(' ').next() == Some(program))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        locked(&self.commands).clear();
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &mut Command) -> Result<String, Error> {
        let rendered = command.render_command();
        locked(&self.commands).push(rendered.clone());

        if locked(&self.failures)
            .iter()
            .any(|prefix| rendered.starts_with(prefix))
        {
            bail!("Error when running: {rendered}: process exited with status: 1");
        }

        Ok(locked(&self.outputs)
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_runner() {
        let runner = RecordingRunner::new();
        runner.fail_on("mkfs.xfs").respond("blkid", "ext4\n");

        runner
            .run(Command::new("mkfs.ext4").arg("/dev/sda1"))
            .unwrap();
        assert_eq!(
            runner.run(Command::new("blkid").arg("/dev/sda1")).unwrap(),
            "ext4\n"
        );
        runner
            .run(Command::new("mkfs.xfs").arg("/dev/sda2"))
            .unwrap_err();

        assert_eq!(
            runner.commands(),
            vec!["mkfs.ext4 /dev/sda1", "blkid /dev/sda1", "mkfs.xfs /dev/sda2"]
        );
        assert_eq!(runner.commands_of("blkid"), vec!["blkid /dev/sda1"]);

        runner.clear();
        assert!(runner.commands().is_empty());
    }
}
