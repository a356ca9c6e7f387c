use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shelfscan")]
#[command(about = "Read barcodes and product details from inventory photos")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML). Defaults to the platform config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Processing cache store. Overrides `cache_path` from the config.
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Extract barcodes and product info from one image
    Process {
        image: PathBuf,
        /// Ignore the cache and recognize again
        #[arg(long, short)]
        force: bool,
    },

    /// Check a scanned barcode against an image
    Verify { barcode: String, image: PathBuf },

    /// Process every image in a directory
    Batch {
        dir: PathBuf,
        #[arg(long, short)]
        force: bool,
        /// Write the JSON report here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show processing cache statistics
    Stats,

    /// List processed images
    List,

    /// Forget one image, or everything when no image is given
    Clear { image: Option<PathBuf> },

    /// Process images as they are dropped into a directory
    Watch { dir: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "shelfscan", "batch", "images", "--force", "--cache", "/tmp/c.json", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.cache, Some(PathBuf::from("/tmp/c.json")));
        match cli.command {
            Commands::Batch { dir, force, output } => {
                assert_eq!(dir, PathBuf::from("images"));
                assert!(force);
                assert_eq!(output, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn verify_takes_barcode_then_image() {
        let cli = Cli::try_parse_from(["shelfscan", "verify", "8885007027531", "ink.jpg"]).unwrap();
        match cli.command {
            Commands::Verify { barcode, image } => {
                assert_eq!(barcode, "8885007027531");
                assert_eq!(image, PathBuf::from("ink.jpg"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn clear_image_is_optional() {
        let cli = Cli::try_parse_from(["shelfscan", "clear"]).unwrap();
        assert!(matches!(cli.command, Commands::Clear { image: None }));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
