//! Audio event classification on a WAV clip.
use std::path::Path;

use crate::assets::{AssetFetcher, AssetResolver};
use crate::graph::{GraphEngine, GraphSessionConfig, Session};
use crate::{Error, Result};

pub const GRAPH_DESCRIPTOR_PATH: &str =
    "mediapipe/modules/audio_classification/audio_classification_desktop_live.binarypb";
pub const YAMNET_MODEL_PATH: &str = "mediapipe/modules/audio_classification/yamnet.tflite";

pub const MODEL_PATH_SIDE_INPUT: &str = "yamnet_model_path";
pub const INPUT_WAV_SIDE_INPUT: &str = "input_audio_wav_path";
pub const AUDIO_CLASS_OUTPUT: &str = "audio_class";

/// Classifies the dominant sound event of a single WAV clip.
pub struct AudioEventClassifier<E> {
    session: Session<E>,
}

impl<E: GraphEngine> AudioEventClassifier<E> {
    /// Resolve the graph and model into the local cache and open a session
    /// bound to `input_wav`.
    pub fn new<F: AssetFetcher>(
        resolver: &AssetResolver<F>,
        engine: E,
        input_wav: impl AsRef<Path>,
    ) -> Result<Self> {
        let graph_path = resolver.ensure_local(GRAPH_DESCRIPTOR_PATH)?;
        let model_path = resolver.ensure_local(YAMNET_MODEL_PATH)?;
        let config = GraphSessionConfig::new(graph_path)
            .side_input(MODEL_PATH_SIDE_INPUT, model_path.to_string_lossy())
            .side_input(INPUT_WAV_SIDE_INPUT, input_wav.as_ref().to_string_lossy())
            .output(AUDIO_CLASS_OUTPUT);
        Ok(Self {
            session: Session::open(engine, config)?,
        })
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    /// Run the graph and return the predicted class label.
    pub fn process(&self) -> Result<String> {
        let outputs = self.session.process()?;
        outputs
            .get(AUDIO_CLASS_OUTPUT)
            .map(str::to_string)
            .ok_or_else(|| Error::Execution(format!("graph did not produce {AUDIO_CLASS_OUTPUT}")))
    }
}
