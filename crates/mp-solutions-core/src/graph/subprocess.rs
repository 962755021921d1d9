//! Engine binding that drives a `simple_run_graph_main` style runner.
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use super::{GraphEngine, RunRequest};
use crate::{Error, Result};

const STREAM_FILE: &str = "output_stream.txt";
const SIDE_PACKETS_FILE: &str = "output_side_packets.txt";

/// Runs each graph in a separate runner process.
///
/// The runner is invoked as
/// `<runner> [args..] --calculator_graph_config_file=<graph>
/// --input_side_packets=k1=v1,k2=v2`, followed by
/// `--output_stream=<name> --output_stream_file=<file> --strip_timestamps`
/// for a requested output stream and
/// `--output_side_packets=p1,p2 --output_side_packets_file=<file>` for
/// requested output side packets. The stream file holds one packet per line
/// and the last one is taken as the value. The side packet file holds
/// `name:value` lines. A non-zero exit status is an engine fault; its stderr
/// becomes the error message.
#[derive(Debug, Clone)]
pub struct SubprocessEngine {
    runner: PathBuf,
    args: Vec<OsString>,
}

/// Requested outputs split by how the runner reports them.
struct OutputPlan<'a> {
    stream: Option<&'a str>,
    side_packets: Vec<&'a str>,
}

impl<'a> OutputPlan<'a> {
    fn new(request: &RunRequest<'a>) -> Result<Self> {
        let (side_packets, streams): (Vec<&str>, Vec<&str>) = request
            .outputs
            .iter()
            .map(String::as_str)
            .partition(|name| request.descriptor.produces_side_packet(name));
        if streams.len() > 1 {
            return Err(Error::Configuration(format!(
                "the graph runner writes a single output stream, got: {}",
                streams.join(", ")
            )));
        }
        Ok(Self {
            stream: streams.first().copied(),
            side_packets,
        })
    }
}

impl SubprocessEngine {
    pub fn new(runner: impl Into<PathBuf>) -> Self {
        Self {
            runner: runner.into(),
            args: Vec::new(),
        }
    }

    /// Extra argument placed before the graph arguments.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    fn command(&self, request: &RunRequest<'_>, out_dir: &Path) -> Result<Command> {
        let plan = OutputPlan::new(request)?;

        let mut command = Command::new(&self.runner);
        command.args(&self.args).arg(format!(
            "--calculator_graph_config_file={}",
            request.graph_path.display()
        ));
        if !request.side_inputs.is_empty() {
            let packets: Vec<String> = request
                .side_inputs
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            command.arg(format!("--input_side_packets={}", packets.join(",")));
        }
        if let Some(stream) = plan.stream {
            command
                .arg(format!("--output_stream={stream}"))
                .arg(format!(
                    "--output_stream_file={}",
                    out_dir.join(STREAM_FILE).display()
                ))
                .arg("--strip_timestamps");
        }
        if !plan.side_packets.is_empty() {
            command
                .arg(format!("--output_side_packets={}", plan.side_packets.join(",")))
                .arg(format!(
                    "--output_side_packets_file={}",
                    out_dir.join(SIDE_PACKETS_FILE).display()
                ));
        }
        Ok(command)
    }
}

impl GraphEngine for SubprocessEngine {
    fn validate(&self, request: &RunRequest<'_>) -> Result<()> {
        for (key, value) in request.side_inputs {
            if key.contains([',', '=']) || value.contains(',') {
                return Err(Error::Configuration(format!(
                    "side input {key} cannot be passed to the graph runner: {value}"
                )));
            }
        }
        OutputPlan::new(request).map(drop)
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<HashMap<String, String>> {
        self.validate(request).map_err(|e| Error::Execution(e.to_string()))?;
        let out_dir = tempfile::tempdir()
            .map_err(|e| Error::Execution(format!("cannot create output directory: {e}")))?;
        let mut command = self
            .command(request, out_dir.path())
            .map_err(|e| Error::Execution(e.to_string()))?;

        debug!(?command, "launching graph runner");
        let output = command.output().map_err(|e| {
            Error::Execution(format!(
                "cannot launch graph runner {}: {e}",
                self.runner.display()
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            warn!(status = %output.status, stderr, "graph runner failed");
            return Err(Error::Execution(format!(
                "graph runner exited with {}: {stderr}",
                output.status
            )));
        }
        collect_outputs(request, out_dir.path())
    }
}

fn collect_outputs(request: &RunRequest<'_>, out_dir: &Path) -> Result<HashMap<String, String>> {
    let plan = OutputPlan::new(request)?;
    let mut outputs = HashMap::new();
    if let Some(stream) = plan.stream {
        if let Some(contents) = read_report(&out_dir.join(STREAM_FILE))? {
            if let Some(value) = last_packet(&contents) {
                outputs.insert(stream.to_string(), value.to_string());
            }
        }
    }
    if !plan.side_packets.is_empty() {
        if let Some(contents) = read_report(&out_dir.join(SIDE_PACKETS_FILE))? {
            outputs.extend(parse_side_packets(&contents, &plan.side_packets));
        }
    }
    Ok(outputs)
}

/// Contents of a report file, or `None` when the runner never wrote it.
fn read_report(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Execution(format!(
            "cannot read runner output {}: {e}",
            path.display()
        ))),
    }
}

fn last_packet(contents: &str) -> Option<&str> {
    contents
        .lines()
        .map(str::trim)
        .rev()
        .find(|line| !line.is_empty())
}

/// Collect the `name:value` lines for the requested side packets.
fn parse_side_packets(contents: &str, wanted: &[&str]) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| wanted.contains(name))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}
