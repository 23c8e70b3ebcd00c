//! Parameter definitions with documented ranges and semantics.
//!
//! All tunables of the visualizer are extracted here with:
//! - Documented units and defaults
//! - `validate()` methods run once at startup, before any device is opened

/// Spectrum analysis configuration
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// FFT window size in samples (must be a power of 2).
    /// Bin count = fft_size / 2.
    pub fft_size: usize,

    /// Magnitude mapped to byte value 0 (decibels, full scale)
    pub db_min: f32,

    /// Magnitude mapped to byte value 255 (decibels, full scale)
    pub db_max: f32,

    /// Exponential time-smoothing constant in [0, 1).
    /// 0 = no smoothing, values near 1 = very slow response.
    pub smoothing: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            db_min: -100.0,
            db_max: -30.0,
            smoothing: 0.8,
        }
    }
}

impl AnalyzerConfig {
    /// Number of spectrum bins produced per refresh
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() {
            return Err(format!(
                "FFT size must be a power of 2, got {}",
                self.fft_size
            ));
        }
        if self.fft_size < 8 {
            return Err(format!("FFT size {} too small (min 8)", self.fft_size));
        }
        if self.db_max <= self.db_min {
            return Err(format!(
                "dB range is empty: {} .. {}",
                self.db_min, self.db_max
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(format!(
                "Smoothing must be in [0, 1), got {}",
                self.smoothing
            ));
        }
        Ok(())
    }
}

/// Tunables of the radial shading algorithm.
///
/// Mirrored one-to-one into the fragment shader uniform buffer.
#[derive(Debug, Clone)]
pub struct VisualParams {
    /// Steepness k of the exponential angular remap.
    /// Larger k devotes more of the circle to low bins.
    pub remap_steepness: f32,

    /// Number of decorative range rings between center and rim
    pub ring_count: u32,

    /// Ring line half-width in normalized radius units
    pub ring_width: f32,

    /// Amplitude below this normalized threshold is treated as silence
    pub noise_gate: f32,

    /// Glow scale at the lowest bin
    pub tilt_min: f32,

    /// Glow scale at the highest bin
    pub tilt_max: f32,

    /// Perceptual gain exponent applied to the tilted amplitude
    pub gain_exponent: f32,

    /// Dim fill inside the circle (linear RGB)
    pub base_color: [f32; 3],

    /// Glow color scaled by amplitude gain (linear RGB)
    pub glow_color: [f32; 3],

    /// Ring line color (linear RGB)
    pub ring_color: [f32; 3],
}

impl Default for VisualParams {
    fn default() -> Self {
        Self {
            remap_steepness: 3.0,
            ring_count: 5,
            ring_width: 0.02,
            noise_gate: 0.01,
            tilt_min: 0.7,
            tilt_max: 2.0,
            gain_exponent: 1.5,
            base_color: [0.015, 0.02, 0.04],
            glow_color: [0.1, 0.85, 0.9],
            ring_color: [0.12, 0.16, 0.22],
        }
    }
}

impl VisualParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.remap_steepness <= 0.0 {
            return Err(format!(
                "Remap steepness must be > 0, got {}",
                self.remap_steepness
            ));
        }
        if self.ring_count == 0 {
            return Err("Ring count must be >= 1".to_string());
        }
        if self.ring_width <= 0.0 {
            return Err(format!("Ring width must be > 0, got {}", self.ring_width));
        }
        if self.gain_exponent <= 0.0 {
            return Err(format!(
                "Gain exponent must be > 0, got {}",
                self.gain_exponent
            ));
        }
        Ok(())
    }
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 900,
            window_height: 900,
        }
    }
}

impl RenderConfig {
    /// Horizontal aspect correction term.
    /// The denominator is floored at 1 so a degenerate viewport
    /// never divides by zero.
    pub fn aspect_ratio(&self) -> f32 {
        self.window_width as f32 / self.window_height.max(1) as f32
    }
}
