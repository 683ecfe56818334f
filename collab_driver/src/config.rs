use collab_conn::ConnConfig;
use collab_core::fuzzer::FuzzerType;
use std::path::PathBuf;

/// File the launcher writes the fuzzer container name into.
pub const DOCKER_MARKER: &str = "docker_hostname";

#[derive(Debug, Clone)]
pub struct Config {
    pub fuzzer_type: FuzzerType,
    /// Output directory used by the fuzzer being monitored.
    pub output_dir: PathBuf,
    /// Enable fuzzer container control.
    pub docker_enabled: bool,
    /// Directory containing `afl-fuzz`, qsym only.
    pub afl_path: Option<PathBuf>,
    /// Target command line, qsym only.
    pub target_cmdline: Vec<String>,
    pub conn: ConnConfig,
}

impl Config {
    pub fn new(fuzzer_type: FuzzerType, output_dir: PathBuf) -> Self {
        Self {
            fuzzer_type,
            output_dir,
            docker_enabled: false,
            afl_path: None,
            target_cmdline: Vec::new(),
            conn: ConnConfig::new(fuzzer_type),
        }
    }

    pub fn check(&self) -> anyhow::Result<()> {
        if self.output_dir.is_file() {
            anyhow::bail!("bad output dir: {}", self.output_dir.display());
        }
        if self.fuzzer_type == FuzzerType::Qsym
            && (self.afl_path.is_none() || self.target_cmdline.is_empty())
        {
            anyhow::bail!("afl path and target command line are required for qsym");
        }
        if self.conn.fuzzer_type != self.fuzzer_type {
            anyhow::bail!(
                "connection registers {} but driver runs {}",
                self.conn.fuzzer_type,
                self.fuzzer_type
            );
        }
        Ok(())
    }

    pub fn docker_marker(&self) -> PathBuf {
        self.output_dir.join(DOCKER_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qsym_needs_afl_and_target() {
        let mut config = Config::new(FuzzerType::Qsym, PathBuf::from("/tmp/out"));
        assert!(config.check().is_err());
        config.afl_path = Some(PathBuf::from("/afl"));
        assert!(config.check().is_err());
        config.target_cmdline = vec!["./target".to_string(), "@@".to_string()];
        config.check().unwrap();
    }

    #[test]
    fn output_dir_not_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let config = Config::new(FuzzerType::Afl, f.path().to_path_buf());
        assert!(config.check().is_err());
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(FuzzerType::Afl, dir.path().join("not-yet"));
        config.check().unwrap();
        assert_eq!(config.docker_marker(), dir.path().join("not-yet/docker_hostname"));
    }
}
