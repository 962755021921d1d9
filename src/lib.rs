//! Command line front end for the MediaPipe solution glue.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mp_solutions_core::{
    hand_style_table, AssetResolver, AudioEventClassifier, ResolverConfig, SubprocessEngine,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory downloaded assets are cached in.
    #[arg(long, env = "MP_SOLUTIONS_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Base URL assets are fetched from on a cache miss.
    #[arg(long, env = "MP_SOLUTIONS_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Log level.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long, global = true)]
    pub tracing: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Classify the sound event in a WAV clip.
    Classify {
        /// WAV file to classify.
        #[arg(long)]
        input: PathBuf,

        /// Graph runner executable.
        #[arg(long, env = "MP_SOLUTIONS_GRAPH_RUNNER", default_value = "run_graph")]
        runner: PathBuf,
    },
    /// Download assets into the cache and print their local paths.
    Fetch {
        /// Logical asset paths, e.g. mediapipe/modules/audio_classification/yamnet.tflite
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the hand landmark drawing styles as JSON.
    Styles,
}

impl Args {
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(dir) = &self.cache_dir {
            config.cache_root = dir.clone();
        }
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        config
    }
}

pub fn run(args: Args) -> Result<()> {
    match &args.command {
        Command::Classify { input, runner } => {
            let resolver = AssetResolver::new(args.resolver_config());
            let engine = SubprocessEngine::new(runner);
            let classifier = AudioEventClassifier::new(&resolver, engine, input)?;
            println!("{}", classifier.process()?);
        }
        Command::Fetch { paths } => {
            let resolver = AssetResolver::new(args.resolver_config());
            for path in resolver.ensure_all(paths)? {
                println!("{}", path.display());
            }
        }
        Command::Styles => {
            println!("{}", serde_json::to_string_pretty(hand_style_table())?);
        }
    }
    Ok(())
}
