use std::{path::Path, process::Command};

use sfxformat::{CommandConfig, Error, Result};

/// Result of starting the post-extraction command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launched {
    /// The command ran to completion. `None` when it was ended by a signal.
    Exited(Option<i32>),
    /// The command was left running with this process id.
    Detached(u32),
}

#[cfg(unix)]
fn build_command(config: &CommandConfig) -> Command {
    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg(config.command_line());
    command
}

#[cfg(windows)]
fn build_command(config: &CommandConfig) -> Command {
    use std::os::windows::process::CommandExt;

    use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;

    // /S makes cmd strip exactly the outer quotes and keep the rest verbatim
    let mut command = Command::new("cmd");
    command.raw_arg(format!("/S /C \"{}\"", config.command_line()));
    if config.silent {
        command.creation_flags(CREATE_NO_WINDOW);
    }
    command
}

/// Starts the configured command in its working directory, which defaults
/// to `extract_dir`.
pub fn run_command(config: &CommandConfig, extract_dir: &Path) -> Result<Launched> {
    let mut command = build_command(config);
    command.current_dir(config.working_dir_or(extract_dir));
    let spawn_error = |source| Error::ProcessSpawn {
        command: config.command_line(),
        source,
    };
    let mut child = command.spawn().map_err(spawn_error)?;
    if !config.wait_for_completion {
        return Ok(Launched::Detached(child.id()));
    }
    let status = child.wait().map_err(spawn_error)?;
    Ok(Launched::Exited(status.code()))
}
