//! Sessions against an external graph-execution engine.
//!
//! A session is opened from a [`GraphSessionConfig`]: the descriptor is read
//! and checked against the supplied side inputs and requested outputs before
//! anything runs. [`Session::process`] then hands the whole request to a
//! [`GraphEngine`] and blocks until it reports the terminal outputs.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::{Error, Result};

pub mod descriptor;
pub use descriptor::{DescriptorError, GraphDescriptor, NodeDescriptor};

mod subprocess;
pub use subprocess::SubprocessEngine;

/// Named side inputs, keyed by side-packet name.
pub type SideInputs = BTreeMap<String, String>;

/// Everything needed to open a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSessionConfig {
    graph_path: PathBuf,
    side_inputs: SideInputs,
    outputs: Vec<String>,
}

impl GraphSessionConfig {
    pub fn new(graph_path: impl Into<PathBuf>) -> Self {
        Self {
            graph_path: graph_path.into(),
            side_inputs: SideInputs::new(),
            outputs: Vec::new(),
        }
    }

    /// Bind a side input. A later value for the same key replaces the earlier one.
    pub fn side_input(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.side_inputs.insert(key.into(), value.into());
        self
    }

    /// Request an output. Repeated names are kept once, in first-seen order.
    pub fn output(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.outputs.contains(&name) {
            self.outputs.push(name);
        }
        self
    }

    pub fn graph_path(&self) -> &Path {
        &self.graph_path
    }

    pub fn side_inputs(&self) -> &SideInputs {
        &self.side_inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }
}

/// A single run handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    pub graph_path: &'a Path,
    pub descriptor: &'a GraphDescriptor,
    pub side_inputs: &'a SideInputs,
    pub outputs: &'a [String],
}

/// The external engine that schedules and executes a graph.
pub trait GraphEngine {
    /// Check that the engine can carry out `request`, before anything runs.
    /// Limits of the engine are reported as [`Error::Configuration`].
    fn validate(&self, _request: &RunRequest<'_>) -> Result<()> {
        Ok(())
    }

    /// Run the graph to completion and return the values it produced, keyed
    /// by output name. Runtime faults are reported as [`Error::Execution`].
    fn run(&self, request: &RunRequest<'_>) -> Result<HashMap<String, String>>;
}

impl<E: GraphEngine + ?Sized> GraphEngine for &E {
    fn validate(&self, request: &RunRequest<'_>) -> Result<()> {
        (**self).validate(request)
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<HashMap<String, String>> {
        (**self).run(request)
    }
}

impl<E: GraphEngine + ?Sized> GraphEngine for Box<E> {
    fn validate(&self, request: &RunRequest<'_>) -> Result<()> {
        (**self).validate(request)
    }

    fn run(&self, request: &RunRequest<'_>) -> Result<HashMap<String, String>> {
        (**self).run(request)
    }
}

/// Terminal outputs of a run, in the order they were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOutputs {
    values: Vec<(String, String)>,
}

impl GraphOutputs {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An opened graph, validated against its configuration.
pub struct Session<E> {
    engine: E,
    config: GraphSessionConfig,
    descriptor: GraphDescriptor,
}

impl<E: GraphEngine> Session<E> {
    /// Load and validate the graph descriptor named by `config`.
    pub fn open(engine: E, config: GraphSessionConfig) -> Result<Self> {
        let path = config.graph_path();
        let bytes = fs::read(path).map_err(|e| {
            Error::Configuration(format!(
                "cannot read graph descriptor {}: {e}",
                path.display()
            ))
        })?;
        let descriptor = GraphDescriptor::from_bytes(&bytes).map_err(|e| {
            Error::Configuration(format!(
                "cannot parse graph descriptor {}: {e}",
                path.display()
            ))
        })?;

        if config.outputs.is_empty() {
            return Err(Error::Configuration("no outputs requested".to_string()));
        }
        let unknown: Vec<&str> = config
            .outputs
            .iter()
            .map(String::as_str)
            .filter(|name| name.is_empty() || !descriptor.produces(name))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::Configuration(format!(
                "graph does not produce: {}",
                unknown.join(", ")
            )));
        }

        let missing: Vec<&str> = descriptor
            .required_side_inputs()
            .into_iter()
            .filter(|key| !config.side_inputs.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "missing required side inputs: {}",
                missing.join(", ")
            )));
        }

        let request = RunRequest {
            graph_path: path,
            descriptor: &descriptor,
            side_inputs: &config.side_inputs,
            outputs: &config.outputs,
        };
        engine.validate(&request)?;

        debug!(
            graph = %path.display(),
            nodes = descriptor.nodes.len(),
            calculators = ?descriptor.calculators().collect::<Vec<_>>(),
            "graph descriptor loaded"
        );
        Ok(Self {
            engine,
            config,
            descriptor,
        })
    }

    pub fn config(&self) -> &GraphSessionConfig {
        &self.config
    }

    pub fn descriptor(&self) -> &GraphDescriptor {
        &self.descriptor
    }

    /// Run the graph to completion, blocking the calling thread.
    ///
    /// Either every requested output is returned with a non-empty value or
    /// the call fails with [`Error::Execution`].
    pub fn process(&self) -> Result<GraphOutputs> {
        let request = RunRequest {
            graph_path: &self.config.graph_path,
            descriptor: &self.descriptor,
            side_inputs: &self.config.side_inputs,
            outputs: &self.config.outputs,
        };
        let start = Instant::now();
        let mut produced = self.engine.run(&request)?;

        let mut values = Vec::with_capacity(self.config.outputs.len());
        for name in &self.config.outputs {
            match produced.remove(name) {
                Some(value) if !value.trim().is_empty() => values.push((name.clone(), value)),
                Some(_) => return Err(Error::Execution(format!("output {name} is empty"))),
                None => {
                    return Err(Error::Execution(format!(
                        "graph finished without producing {name}"
                    )))
                }
            }
        }
        info!(
            graph = %self.config.graph_path.display(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
            "graph run complete"
        );
        Ok(GraphOutputs { values })
    }
}

/// Hand-encoded descriptors for tests.
#[cfg(test)]
pub(crate) mod test_support {
    pub fn varint(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    pub fn len_field(number: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = varint(u64::from(number) << 3 | 2);
        out.extend(varint(payload.len() as u64));
        out.extend_from_slice(payload);
        out
    }

    pub fn node(
        calculator: &str,
        inputs: &[&str],
        outputs: &[&str],
        side_inputs: &[&str],
        side_outputs: &[&str],
    ) -> Vec<u8> {
        let mut out = len_field(2, calculator.as_bytes());
        for (number, entries) in [(3, inputs), (4, outputs), (5, side_inputs), (6, side_outputs)] {
            for entry in entries {
                out.extend(len_field(number, entry.as_bytes()));
            }
        }
        out
    }

    /// Decoder feeding the classifier, as in the desktop audio graph.
    pub fn audio_graph() -> Vec<u8> {
        [
            len_field(
                1,
                &node(
                    "AudioDecoderCalculator",
                    &[],
                    &["AUDIO:audio_matrix"],
                    &["INPUT_FILE_PATH:input_audio_wav_path"],
                    &[],
                ),
            ),
            len_field(
                1,
                &node(
                    "TfliteTaskAudioClassifierCalculator",
                    &["DATA:audio_matrix"],
                    &["CLASS:audio_class"],
                    &["MODEL_PATH:yamnet_model_path"],
                    &[],
                ),
            ),
            len_field(15, b"audio_class"),
            len_field(16, b"yamnet_model_path"),
            len_field(16, b"input_audio_wav_path"),
        ]
        .concat()
    }
}
