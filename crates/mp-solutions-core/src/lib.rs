//! Glue for running MediaPipe solution graphs: model-asset resolution, typed
//! sessions over an external graph engine, the audio event classifier built
//! on both, and hand-landmark drawing styles.
mod error;
pub use error::{Error, Result};

pub mod assets;
pub use assets::{AssetFetcher, AssetReference, AssetResolver, HttpFetcher, ResolverConfig};

pub mod graph;
pub use graph::{GraphEngine, GraphOutputs, GraphSessionConfig, Session, SubprocessEngine};

pub mod audio_classification;
pub use audio_classification::AudioEventClassifier;

pub mod hands;
pub use hands::{HandLandmark, HAND_CONNECTIONS};

pub mod drawing_styles;
pub use drawing_styles::{build_style_table, hand_style_table, StyleTable};
