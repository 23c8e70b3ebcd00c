//! Live audio capture and FFT spectrum analysis.
//!
//! The capture side (`SpectrumAnalyzer`) owns the cpal input stream and a
//! lock-free ring buffer; the transform side (`SpectrumProcessor`) is a pure
//! sliding-window FFT that can be driven with synthetic samples in tests.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;
use thiserror::Error;

/// Ring buffer capacity in seconds of audio
const RING_SECONDS: usize = 2;

/// Errors from the one-time audio initialization gate
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Audio input access denied: {0}")]
    PermissionDenied(String),
    #[error("Audio input device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Unsupported audio sample format: {0}")]
    UnsupportedFormat(String),
}

/// Sliding-window FFT over the most recent `fft_size` samples.
///
/// Holds the Hann window, FFT plan, scratch buffers and the smoothed
/// magnitude state. Quantization policy: magnitudes are normalized by the
/// window size, exponentially smoothed over time, converted to decibels and
/// mapped linearly from [db_min, db_max] onto [0, 255]. The mapping is
/// monotonic in input magnitude and stable frame-to-frame.
pub struct SpectrumProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    samples: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    db_min: f32,
    db_max: f32,
    smoothing: f32,
}

impl SpectrumProcessor {
    pub fn new(config: &crate::params::AnalyzerConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft,
            fft_size,
            window: (0..fft_size).map(|i| hann_window(i, fft_size)).collect(),
            samples: vec![0.0; fft_size],
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: vec![0.0; fft_size / 2],
            db_min: config.db_min,
            db_max: config.db_max,
            smoothing: config.smoothing,
        }
    }

    /// Number of spectrum bins produced by `write_bins`
    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Append mono samples to the sliding window, keeping the most
    /// recent `fft_size` of them
    pub fn push_samples(&mut self, incoming: &[f32]) {
        let n = self.fft_size;
        if incoming.len() >= n {
            self.samples.copy_from_slice(&incoming[incoming.len() - n..]);
        } else {
            let keep = n - incoming.len();
            self.samples.copy_within(n - keep.., 0);
            self.samples[keep..].copy_from_slice(incoming);
        }
    }

    /// Overwrite `out` with the current byte-quantized spectrum estimate.
    ///
    /// Always returns immediately: if no new audio has been pushed since the
    /// last call, the previous window contents are transformed again.
    ///
    /// # Panics
    /// If `out.len() != bin_count()`.
    pub fn write_bins(&mut self, out: &mut [u8]) {
        assert_eq!(out.len(), self.bin_count(), "snapshot length mismatch");

        for (i, (&sample, &w)) in self.samples.iter().zip(&self.window).enumerate() {
            self.buffer[i] = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let db_span = self.db_max - self.db_min;
        for (i, byte) in out.iter_mut().enumerate() {
            let magnitude = self.buffer[i].norm() * norm;
            let s = &mut self.smoothed[i];
            *s = self.smoothing * *s + (1.0 - self.smoothing) * magnitude;

            let db = 20.0 * s.max(1e-10).log10();
            let scaled = (db - self.db_min) / db_span;
            *byte = (scaled.clamp(0.0, 1.0) * 255.0) as u8;
        }
    }
}

/// Live audio analyzer: default input device, downmixed to mono,
/// flowing through a SPSC ring into the processor.
pub struct SpectrumAnalyzer {
    processor: SpectrumProcessor,
    consumer: HeapCons<f32>,
    /// Keeps the capture stream alive for the session
    _stream: cpal::Stream,
}

impl SpectrumAnalyzer {
    /// Open the default audio input and begin continuous buffering.
    ///
    /// This is the session's one-time permission gate: a failure here is
    /// terminal for the attempt, and the caller decides whether to retry.
    pub fn initialize(config: &crate::params::AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AnalyzerError::DeviceUnavailable("no input device found".into()))?;

        let stream_config = device
            .default_input_config()
            .map_err(|e| AnalyzerError::DeviceUnavailable(e.to_string()))?;

        let sample_rate = stream_config.sample_rate().0;
        let channels = stream_config.channels() as usize;

        let ring = HeapRb::<f32>::new(sample_rate as usize * RING_SECONDS);
        let (producer, consumer) = ring.split();

        let stream = build_capture_stream(&device, &stream_config, channels, producer)?;
        stream
            .play()
            .map_err(|e| AnalyzerError::DeviceUnavailable(e.to_string()))?;

        println!(
            "Audio input: {} @ {}Hz, {} bins",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate,
            config.bin_count(),
        );

        Ok(Self {
            processor: SpectrumProcessor::new(config),
            consumer,
            _stream: stream,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.processor.bin_count()
    }

    /// Zero-initialized spectrum snapshot of the right length
    pub fn new_snapshot(&self) -> Vec<u8> {
        vec![0; self.bin_count()]
    }

    /// Refresh `snapshot` in place with the latest spectrum estimate.
    ///
    /// Drains whatever the capture thread has buffered, then transforms the
    /// most recent window. Never blocks waiting for new audio.
    pub fn refresh(&mut self, snapshot: &mut [u8]) {
        let mut chunk = [0.0f32; 1024];
        loop {
            let n = self.consumer.pop_slice(&mut chunk);
            if n == 0 {
                break;
            }
            self.processor.push_samples(&chunk[..n]);
        }
        self.processor.write_bins(snapshot);
    }
}

fn build_capture_stream(
    device: &cpal::Device,
    config: &cpal::SupportedStreamConfig,
    channels: usize,
    mut producer: HeapProd<f32>,
) -> Result<cpal::Stream, AnalyzerError> {
    let err_fn = |err| eprintln!("Audio stream error: {}", err);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| s);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| s as f32 / i16::MAX as f32);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config.clone().into(),
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                push_mono(&mut producer, data, channels, |s| {
                    (s as f32 / u16::MAX as f32) * 2.0 - 1.0
                });
            },
            err_fn,
            None,
        ),
        other => return Err(AnalyzerError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AnalyzerError::DeviceUnavailable(e.to_string())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            AnalyzerError::UnsupportedFormat(e.to_string())
        }
        other => AnalyzerError::PermissionDenied(other.to_string()),
    })
}

/// Downmix interleaved frames to mono and push them into the ring.
/// Overflow drops the newest samples; the capture callback must not block.
fn push_mono<T: Copy>(
    producer: &mut HeapProd<f32>,
    data: &[T],
    channels: usize,
    convert: impl Fn(T) -> f32,
) {
    let mut mono = Vec::with_capacity(data.len() / channels.max(1));
    for frame in data.chunks(channels.max(1)) {
        let sum: f32 = frame.iter().map(|&s| convert(s)).sum();
        mono.push(sum / channels.max(1) as f32);
    }
    let _ = producer.push_slice(&mono);
}

/// Hann window coefficient for sample `index` of a `size`-sample block
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AnalyzerConfig;

    fn test_config(smoothing: f32) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: 1024,
            smoothing,
            ..Default::default()
        }
    }

    /// Pure cosine whose frequency lands exactly on FFT bin `bin`
    fn cosine_at_bin(bin: usize, fft_size: usize, amplitude: f32) -> Vec<f32> {
        (0..fft_size)
            .map(|n| amplitude * (2.0 * PI * bin as f32 * n as f32 / fft_size as f32).cos())
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let size = 1024;

        // Hann window should be 0 at edges, 1 at center
        assert!((hann_window(0, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size - 1, size) - 0.0).abs() < 0.01);
        assert!((hann_window(size / 2, size) - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_silence_produces_zero_bins() {
        let mut processor = SpectrumProcessor::new(&test_config(0.0));
        let mut bins = vec![0u8; processor.bin_count()];
        processor.write_bins(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        let mut processor = SpectrumProcessor::new(&test_config(0.0));
        // Quiet enough that the peak bin stays below the 255 ceiling,
        // keeping it strictly above the Hann side bins
        processor.push_samples(&cosine_at_bin(100, 1024, 0.1));

        let mut bins = vec![0u8; processor.bin_count()];
        processor.write_bins(&mut bins);

        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 100);

        // Energy far from the tone stays near the noise floor
        assert!(bins[100] > 180);
        assert!(bins[300] < bins[100] / 2);
    }

    #[test]
    fn test_quantization_monotonic_in_amplitude() {
        let mut quiet = SpectrumProcessor::new(&test_config(0.0));
        let mut loud = SpectrumProcessor::new(&test_config(0.0));
        quiet.push_samples(&cosine_at_bin(64, 1024, 0.01));
        loud.push_samples(&cosine_at_bin(64, 1024, 0.5));

        let mut quiet_bins = vec![0u8; quiet.bin_count()];
        let mut loud_bins = vec![0u8; loud.bin_count()];
        quiet.write_bins(&mut quiet_bins);
        loud.write_bins(&mut loud_bins);

        assert!(loud_bins[64] > quiet_bins[64]);
    }

    #[test]
    fn test_refresh_without_new_audio_is_stable() {
        let mut processor = SpectrumProcessor::new(&test_config(0.0));
        processor.push_samples(&cosine_at_bin(42, 1024, 0.3));

        let mut first = vec![0u8; processor.bin_count()];
        let mut second = vec![0u8; processor.bin_count()];
        processor.write_bins(&mut first);
        processor.write_bins(&mut second);

        assert_eq!(first, second);
    }

    #[test]
    fn test_push_keeps_most_recent_window() {
        let mut with_preroll = SpectrumProcessor::new(&test_config(0.0));
        let mut direct = SpectrumProcessor::new(&test_config(0.0));

        let tone = cosine_at_bin(33, 1024, 0.4);
        with_preroll.push_samples(&vec![0.25; 1024]);
        with_preroll.push_samples(&tone);
        direct.push_samples(&tone);

        let mut a = vec![0u8; 512];
        let mut b = vec![0u8; 512];
        with_preroll.write_bins(&mut a);
        direct.write_bins(&mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn test_partial_push_shifts_window() {
        let mut processor = SpectrumProcessor::new(&test_config(0.0));
        // Two half-window pushes of the same tone must equal one full push
        let tone = cosine_at_bin(50, 1024, 0.4);
        processor.push_samples(&tone[..512]);
        processor.push_samples(&tone[512..]);

        let mut reference = SpectrumProcessor::new(&test_config(0.0));
        reference.push_samples(&tone);

        let mut a = vec![0u8; 512];
        let mut b = vec![0u8; 512];
        processor.write_bins(&mut a);
        reference.write_bins(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_smoothing_rises_toward_steady_state() {
        let mut processor = SpectrumProcessor::new(&test_config(0.8));
        processor.push_samples(&cosine_at_bin(60, 1024, 0.5));

        let mut bins = vec![0u8; processor.bin_count()];
        processor.write_bins(&mut bins);
        let first = bins[60];
        processor.write_bins(&mut bins);
        let second = bins[60];

        // With tau = 0.8 the smoothed estimate keeps approaching the tone
        assert!(second >= first);
    }
}
