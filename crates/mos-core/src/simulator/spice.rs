//! External SPICE simulator runner.
//!
//! The netlist is written to `<run_dir>/<stem>.spice` and the simulator is
//! started in batch mode with `run_dir` as working directory. Each
//! requested output is read back from `<run_dir>/<stem>_<output>.raw`;
//! the bench's control section is responsible for writing those files.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{SimulatorConfig, SimulatorKind};
use crate::error::SimulationError;
use crate::simulator::{parse_rawfile, SimRequest, SimResult, Simulator};

/// Keywords that mark a run as untrustworthy when found in the log.
const FATAL_KEYWORDS: [&str; 2] = ["fatal", "aborted"];

#[derive(Debug, Clone)]
pub struct SpiceSimulator {
    pub config: SimulatorConfig,
}

impl SpiceSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn kind(&self) -> SimulatorKind {
        self.config.kind
    }

    fn path(&self, suffix: &str) -> PathBuf {
        self.config
            .run_dir
            .join(format!("{}{}", self.config.stem, suffix))
    }

    fn file_name(&self, suffix: &str) -> String {
        format!("{}{}", self.config.stem, suffix)
    }

    fn output_path(&self, output: &str) -> PathBuf {
        self.path(&format!("_{}.raw", output))
    }

    fn command(&self) -> Command {
        let netlist = self.file_name(".spice");
        let raw = self.file_name(".raw");
        let mut cmd = Command::new(self.config.executable());
        cmd.current_dir(&self.config.run_dir);
        match self.config.kind {
            SimulatorKind::Ngspice => {
                cmd.env("SPICE_ASCIIRAWFILE", "1")
                    .arg("-b")
                    .arg("-r")
                    .arg(raw)
                    .arg("-o")
                    .arg(self.file_name(".out"))
                    .arg(netlist);
            }
            SimulatorKind::Xyce => {
                cmd.arg("-r").arg(raw).arg("-a").arg(netlist);
            }
            SimulatorKind::Spectre => {
                cmd.arg("-format")
                    .arg("nutascii")
                    .arg("-raw")
                    .arg(raw)
                    .arg(netlist);
            }
        }
        cmd
    }

    fn collect_log(&self, stdout: &[u8], stderr: &[u8]) -> String {
        let mut log = String::new();
        if self.config.kind == SimulatorKind::Ngspice {
            if let Ok(text) = std::fs::read_to_string(self.path(".out")) {
                log.push_str(&text);
            }
        }
        log.push_str(&String::from_utf8_lossy(stdout));
        log.push_str(&String::from_utf8_lossy(stderr));
        log
    }
}

/// True when the simulator log reports a fatal or aborted run.
pub fn log_reports_failure(log: &str) -> bool {
    let lower = log.to_ascii_lowercase();
    FATAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn remove_stale(path: &Path) -> Result<(), SimulationError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(SimulationError::Prepare(format!(
            "cannot remove {}: {}",
            path.display(),
            err
        ))),
    }
}

impl Simulator for SpiceSimulator {
    fn run(&mut self, request: &SimRequest<'_>) -> Result<SimResult, SimulationError> {
        std::fs::create_dir_all(&self.config.run_dir).map_err(|err| {
            SimulationError::Prepare(format!(
                "cannot create {}: {}",
                self.config.run_dir.display(),
                err
            ))
        })?;

        let netlist = request
            .testbench
            .render(self.config.kind, request.params, request.settings);
        let netlist_path = self.path(".spice");
        std::fs::write(&netlist_path, netlist).map_err(|err| {
            SimulationError::Prepare(format!("cannot write {}: {}", netlist_path.display(), err))
        })?;
        for output in request.outputs {
            remove_stale(&self.output_path(output))?;
        }

        tracing::debug!(
            simulator = ?self.config.kind,
            params = %request.params.describe(),
            "running simulation"
        );
        let output = self
            .command()
            .output()
            .map_err(|err| SimulationError::Spawn {
                executable: self.config.executable().to_string(),
                message: err.to_string(),
            })?;

        let log = self.collect_log(&output.stdout, &output.stderr);
        if log_reports_failure(&log) {
            tracing::error!("error in simulation:\n{}", log);
            return Err(SimulationError::Fatal { log });
        }
        if !output.status.success() {
            return Err(SimulationError::Exit {
                status: output.status.to_string(),
                log,
            });
        }

        let mut result = SimResult::new();
        for name in request.outputs {
            let path = self.output_path(name);
            if !path.exists() {
                return Err(SimulationError::MissingResult { path });
            }
            let text = std::fs::read_to_string(&path)
                .map_err(|err| SimulationError::Results(format!("{}: {}", path.display(), err)))?;
            let dataset = parse_rawfile(name, &text)
                .map_err(|err| SimulationError::Results(format!("{}: {}", path.display(), err)))?;
            result.insert(dataset);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_keywords_are_case_insensitive() {
        assert!(log_reports_failure("Error: FATAL problem in model"));
        assert!(log_reports_failure("simulation aborted"));
        assert!(!log_reports_failure("Circuit: nmos characterise\nDone"));
    }

    #[test]
    fn output_paths_follow_stem() {
        let sim = SpiceSimulator::new(SimulatorConfig::default());
        assert_eq!(
            sim.output_path("op1"),
            PathBuf::from("rundir").join("spiceinterface_temp_op1.raw")
        );
    }
}
