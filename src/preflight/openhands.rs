//! The agent command must exist and answer `--version`.

use std::time::Duration;

use crate::process::{CommandRunner, CommandSpec};

const VERSION_TIMEOUT: Duration = Duration::from_secs(60);

pub fn check_openhands_command(runner: &dyn CommandRunner, command_line: &str) -> Result<(), String> {
    let argv = shlex::split(command_line).unwrap_or_default();
    let Some((program, args)) = argv.split_first() else {
        return Err("OPENHANDS_COMMAND must not be empty.".to_string());
    };

    let spec = CommandSpec::new(program.as_str())
        .args(args.iter().map(String::as_str))
        .arg("--version")
        .timeout(Some(VERSION_TIMEOUT));

    match runner.run(&spec) {
        Ok(output) if output.success() => Ok(()),
        _ => Err(format!(
            "OpenHands command is not runnable. Please verify OPENHANDS_COMMAND and dependencies. command={}",
            command_line
        )),
    }
}
