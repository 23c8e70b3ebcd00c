//! Command-line argument parsing.

use clap::Parser;

use crate::params::{AnalyzerConfig, VisualParams};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Aurascope")]
#[command(about = "Circular real-time audio spectrum visualizer", long_about = None)]
pub struct Args {
    /// FFT window size in samples (power of 2; bin count = size / 2)
    #[arg(long, value_name = "SAMPLES", default_value_t = 2048)]
    pub fft_size: usize,

    /// Steepness of the exponential angular remap
    #[arg(long, value_name = "K", default_value_t = 3.0)]
    pub steepness: f32,

    /// Number of decorative range rings
    #[arg(long, value_name = "COUNT", default_value_t = 5)]
    pub rings: u32,
}

impl Args {
    /// Analyzer configuration with CLI overrides applied
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: self.fft_size,
            ..Default::default()
        }
    }

    /// Visual parameters with CLI overrides applied
    pub fn visual_params(&self) -> VisualParams {
        VisualParams {
            remap_steepness: self.steepness,
            ring_count: self.rings,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_arguments() {
        let args = Args::parse_from(["aurascope"]);
        assert_eq!(args.fft_size, 2048);
        assert_eq!(args.steepness, 3.0);
        assert_eq!(args.rings, 5);
        assert!(args.analyzer_config().validate().is_ok());
        assert!(args.visual_params().validate().is_ok());
    }

    #[test]
    fn test_overrides_flow_into_params() {
        let args = Args::parse_from(["aurascope", "--fft-size", "1024", "--rings", "8"]);
        assert_eq!(args.analyzer_config().bin_count(), 512);
        assert_eq!(args.visual_params().ring_count, 8);
    }
}
