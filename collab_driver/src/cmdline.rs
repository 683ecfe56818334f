//! Command line the operator should launch the fuzzer with.

use crate::config::Config;
use collab_core::fuzzer::{Backend, FuzzerType};

pub fn suggestion(config: &Config) -> String {
    let out = config.output_dir.display();
    match config.fuzzer_type.backend() {
        Backend::AflFamily => format!(
            "afl-fuzz -i input_dir -o {} -M {} -- /path/to/target.afl",
            out, config.fuzzer_type
        ),
        Backend::Angora => format!(
            "angora_fuzzer -i input_dir -o {} -S -t /path/to/target.track -- /path/to/target.fast",
            out
        ),
        Backend::Qsym => format!(
            "bin/run_qsym_afl.py -a framework -o {} -n {} -- /path/to/target",
            out,
            FuzzerType::Qsym
        ),
        Backend::LibFuzzer => {
            format!("TARGET_BIN -artifact_prefix={0}/artifacts/ {0}/queue", out)
        }
        Backend::Honggfuzz => format!(
            "honggfuzz --input {0}/seeds --output {0}/queue --crashdir {0}/crashes \
             -y {0}/sync -- /path/to/target.honggfuzz",
            out
        ),
    }
}
