use collab_core::fuzzer::FuzzerType;
use collab_driver::{boot, config::Config};
use env_logger::Env;
use std::{io::Write, path::PathBuf, thread};
use structopt::StructOpt;

/// Generic collab fuzzing driver that supports a large variety of fuzzers.
#[derive(Debug, StructOpt)]
#[structopt(name = "collab-driver")]
struct Settings {
    /// Enable debug logging.
    #[structopt(long, short = "v")]
    verbose: bool,
    /// Type of the fuzzer being monitored.
    fuzzer_type: FuzzerType,
    /// Output directory used by the fuzzer being monitored.
    output_dir: PathBuf,
    /// Enable fuzzer container control.
    #[structopt(long, short = "d")]
    enable_docker: bool,
    /// Path to AFL, required for qsym.
    #[structopt(long, short = "a")]
    afl_path: Option<PathBuf>,
    /// Control endpoint of the server.
    #[structopt(long, env = "URI_CONTROL", default_value = "ipc:///tmp/server-ctrl.ipc")]
    ctrl_uri: String,
    /// Endpoint the server publishes jobs on.
    #[structopt(long, env = "URI_SCHEDULER", default_value = "ipc:///tmp/server-push.ipc")]
    pull_uri: String,
    /// Endpoint test cases are submitted to.
    #[structopt(long, env = "URI_LISTENER", default_value = "ipc:///tmp/server-pull.ipc")]
    push_uri: String,
    /// Target command line, required for qsym.
    target_cmdline: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_args();

    let level = if settings.verbose { "debug" } else { "info" };
    let log_env = Env::new()
        .filter_or("COLLAB_LOG", level)
        .default_write_style_or("auto");
    env_logger::Builder::from_env(log_env)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {} {}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                thread::current().name().unwrap_or("-"),
                record.args()
            )
        })
        .init();

    let mut config = Config::new(settings.fuzzer_type, settings.output_dir);
    config.docker_enabled = settings.enable_docker;
    config.afl_path = settings.afl_path;
    config.target_cmdline = settings.target_cmdline;
    config.conn.ctrl_uri = settings.ctrl_uri;
    config.conn.pull_uri = settings.pull_uri;
    config.conn.push_uri = settings.push_uri;

    boot(config)
}
