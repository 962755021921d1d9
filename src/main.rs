//! Resolve solution assets, classify audio clips and export drawing styles.
//!
//! # Example usage
//! ```sh
//! cargo run --release -- classify --input dog_bark.wav --runner ./run_graph
//! cargo run --release -- styles
//! ```
use anyhow::Result;
use clap::Parser;

use mp_solutions::{run, Args};

fn main() -> Result<()> {
    use tracing_chrome::ChromeLayerBuilder;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let args = Args::parse();
    let _guard = if args.tracing {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().build();
        tracing_subscriber::registry().with(chrome_layer).init();
        Some(guard)
    } else {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        None
    };
    run(args)
}
