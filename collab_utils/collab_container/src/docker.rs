//! Control a docker container through the docker cli.
use crate::{ContainerError, ManageContainer};
use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path to docker cli, default is "docker".
    pub docker_bin: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            docker_bin: PathBuf::from("docker"),
        }
    }
}

pub struct DockerHandle {
    config: DockerConfig,
    name: String,
    id: String,
}

impl DockerHandle {
    /// Look up the container by name or id.
    pub fn attach(config: DockerConfig, name: &str) -> Result<Self, ContainerError> {
        let mut cmd = Command::new(&config.docker_bin);
        cmd.args(&["inspect", "--format", "{{.Id}}", name]);
        let id = match run(cmd) {
            Ok(out) => out.trim().to_string(),
            Err(ContainerError::Command { stderr, .. }) if stderr.contains("No such") => {
                return Err(ContainerError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e),
        };
        if id.is_empty() {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        log::debug!("container {} resolved to {}", name, id);

        Ok(Self {
            config,
            name: name.to_string(),
            id,
        })
    }

    fn docker(&self, args: &[&str]) -> Result<(), ContainerError> {
        let mut cmd = Command::new(&self.config.docker_bin);
        cmd.args(args).arg(&self.id);
        run(cmd).map(|_| ())
    }
}

impl ManageContainer for DockerHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn pause(&mut self) -> Result<(), ContainerError> {
        self.docker(&["pause"])
    }

    fn unpause(&mut self) -> Result<(), ContainerError> {
        self.docker(&["unpause"])
    }

    fn kill(&mut self) -> Result<(), ContainerError> {
        self.docker(&["kill"])
    }

    fn set_cpu_shares(&mut self, shares: u64) -> Result<(), ContainerError> {
        let shares = shares.to_string();
        self.docker(&["update", "--cpu-shares", &shares])
    }
}

fn run(mut cmd: Command) -> Result<String, ContainerError> {
    cmd.stdin(Stdio::null());
    log::trace!("spawning command: {:?}", cmd);
    let output = cmd.output()?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(ContainerError::Command {
            cmd: format!("{:?}", cmd),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_with_missing_cli() {
        let config = DockerConfig {
            docker_bin: PathBuf::from("/nonexistent/docker-cli"),
        };
        let err = DockerHandle::attach(config, "fuzzer").err().unwrap();
        assert!(matches!(err, ContainerError::Spawn(_)));
    }

    #[test]
    fn failed_command_keeps_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(&["-c", "echo boom >&2; exit 3"]);
        match run(cmd) {
            Err(ContainerError::Command { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
