//! Default `CommandRunner`: spawns `SHELL -c <command>` detached, never
//! awaiting its output. Grounded on the teacher's
//! `src/kanata/cmd.rs::run_cmd_in_thread` (fire-and-forget
//! `std::process::Command` inside a detached `std::thread::spawn`),
//! adapted to mkhd's free-form shell command strings (`spec.md` §3
//! `Action::Command`) rather than kanata's sexpr keypress-sequence DSL.

use crate::collaborators::CommandRunner;
use std::env;

const LOG_PREFIX: &str = "cmd:";

/// `spec.md` §6 "Environment": `SHELL` (falls back to `/bin/bash`).
fn shell() -> String {
    env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string())
}

pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) {
        let command = command.to_string();
        std::thread::spawn(move || {
            let shell = shell();
            log::debug!("{LOG_PREFIX} running: {command}");
            let mut cmd = std::process::Command::new(&shell);
            cmd.arg("-c").arg(&command);
            match cmd.output() {
                Ok(output) => {
                    if !output.status.success() {
                        log::warn!(
                            "{LOG_PREFIX} '{command}' exited with {}: {}",
                            output.status,
                            String::from_utf8_lossy(&output.stderr)
                        );
                    }
                }
                Err(e) => {
                    log::warn!("{LOG_PREFIX} failed to spawn '{shell} -c {command}': {e}");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_falls_back_to_bash_when_unset() {
        let prev = env::var("SHELL").ok();
        unsafe { env::remove_var("SHELL") };
        assert_eq!(shell(), "/bin/bash");
        if let Some(prev) = prev {
            unsafe { env::set_var("SHELL", prev) };
        }
    }

    #[test]
    fn runner_does_not_panic_on_empty_command() {
        let runner = ShellCommandRunner;
        runner.run(":"); // shell no-op builtin, keeps the test fast and side-effect free
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
}
