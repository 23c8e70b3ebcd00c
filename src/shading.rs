//! CPU mirror of the radial shading algorithm in `shader.wgsl`.
//!
//! The fragment shader and this module implement the same math over the
//! same inputs; keep them in lockstep when tuning. Having the algorithm on
//! the CPU makes its properties (remap monotonicity, kernel weights, mask
//! and ring behavior) ordinary unit tests instead of GPU captures.

use crate::params::VisualParams;
use std::f32::consts::{PI, TAU};

/// Fade-out start radius for the ring pattern; rings vanish at the rim
const RING_FADE_START: f32 = 0.8;

/// Cubic smoothstep, matching the WGSL builtin. Reversed edges
/// (`edge0 > edge1`) produce the mirrored ramp, as used by the ring lines.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Recenter a [0,1]^2 coordinate to [-1,1]^2 and apply horizontal
/// aspect correction
pub fn aspect_correct(uv: [f32; 2], aspect: f32) -> [f32; 2] {
    [(uv[0] * 2.0 - 1.0) * aspect, uv[1] * 2.0 - 1.0]
}

/// Angle of the corrected point, rotated so zero points up,
/// normalized to [0, 1)
pub fn angle01(p: [f32; 2]) -> f32 {
    let mut angle = p[1].atan2(p[0]) - PI * 0.5;
    if angle < 0.0 {
        angle += TAU;
    }
    angle / TAU
}

/// Exponential angular remap with steepness `k`.
/// Fixed points remap(0) = 0 and remap(1) = 1; strictly increasing for k > 0.
pub fn remap_angle(angle01: f32, k: f32) -> f32 {
    ((angle01 * k).exp() - 1.0) / (k.exp() - 1.0)
}

/// Continuous bin coordinate for a remapped angle, clamped to
/// [1, bin_count - 1] so the DC bin never contributes
pub fn bin_coord(remapped: f32, bin_count: usize) -> f32 {
    (remapped * (bin_count as f32 - 1.0)).clamp(1.0, bin_count as f32 - 1.0)
}

/// Texel-center texture coordinate of integer bin `i`
pub fn texel_center(i: usize, bin_count: usize) -> f32 {
    (i as f32 + 0.5) / bin_count as f32
}

/// Linearly interpolated, edge-clamped read of the snapshot at texture
/// coordinate `coord` in [0, 1]. Matches the GPU sampler configuration
/// (linear filtering, clamp-to-edge).
pub fn sample_linear(snapshot: &[u8], coord: f32) -> f32 {
    let b = snapshot.len() as f32;
    let pos = coord * b - 0.5;
    let i0 = pos.floor();
    let frac = pos - i0;
    let lo = (i0.max(0.0) as usize).min(snapshot.len() - 1);
    let hi = ((i0 + 1.0).max(0.0) as usize).min(snapshot.len() - 1);
    let a = snapshot[lo] as f32 / 255.0;
    let c = snapshot[hi] as f32 / 255.0;
    a + (c - a) * frac.clamp(0.0, 1.0)
}

/// 1-2-1 smoothing kernel across the continuous bin coordinate and its
/// two neighbors, sampled at texel centers
pub fn sample_smoothed(snapshot: &[u8], bin: f32) -> f32 {
    let b = snapshot.len() as f32;
    let below = sample_linear(snapshot, (bin - 0.5) / b);
    let center = sample_linear(snapshot, (bin + 0.5) / b);
    let above = sample_linear(snapshot, (bin + 1.5) / b);
    (below + 2.0 * center + above) / 4.0
}

/// Amplitude gain for one fragment: gate, frequency tilt, then the
/// perceptual exponent
pub fn amplitude_gain(smoothed: f32, bin: f32, bin_count: usize, params: &VisualParams) -> f32 {
    let gated = (smoothed - params.noise_gate).max(0.0);
    let tilt = ((bin + 1.0) / bin_count as f32).sqrt();
    let tilted = gated * (params.tilt_min + (params.tilt_max - params.tilt_min) * tilt);
    tilted.powf(params.gain_exponent)
}

/// Ring line intensity before the rim fade: a thin anti-aliased line
/// repeating `count` times as radius sweeps 0 to 1
pub fn ring_profile(radius: f32, count: u32, width: f32) -> f32 {
    let t = (radius * count as f32).fract();
    smoothstep(width, 0.0, t.min(1.0 - t))
}

/// Rim fade applied on top of the ring profile
pub fn ring_fade(radius: f32) -> f32 {
    1.0 - smoothstep(RING_FADE_START, 1.0, radius)
}

/// Full per-pixel pipeline. Returns `None` outside the circular mask,
/// otherwise the final linear RGB color.
pub fn shade(uv: [f32; 2], aspect: f32, snapshot: &[u8], params: &VisualParams) -> Option<[f32; 3]> {
    let p = aspect_correct(uv, aspect);
    let radius = (p[0] * p[0] + p[1] * p[1]).sqrt();
    if radius > 1.0 {
        return None;
    }

    let remapped = remap_angle(angle01(p), params.remap_steepness);
    let bin = bin_coord(remapped, snapshot.len());
    let smoothed = sample_smoothed(snapshot, bin);
    let gain = amplitude_gain(smoothed, bin, snapshot.len(), params);
    let ring = ring_profile(radius, params.ring_count, params.ring_width) * ring_fade(radius);

    let mut color = [0.0f32; 3];
    for c in 0..3 {
        color[c] = params.base_color[c] + params.glow_color[c] * gain + params.ring_color[c] * ring;
    }
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::VisualParams;

    const B: usize = 1024;

    /// uv coordinate on the unit circle at normalized angle `a01`
    /// (inverse of the corrected-space angle computation, aspect 1)
    fn uv_at_angle(a01: f32, radius: f32) -> [f32; 2] {
        let theta = a01 * TAU + PI * 0.5;
        let p = [radius * theta.cos(), radius * theta.sin()];
        [(p[0] + 1.0) / 2.0, (p[1] + 1.0) / 2.0]
    }

    #[test]
    fn test_remap_fixed_points() {
        for k in [0.5, 1.0, 3.0, 8.0] {
            assert!((remap_angle(0.0, k) - 0.0).abs() < 1e-6);
            assert!((remap_angle(1.0, k) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_remap_strictly_increasing() {
        let k = 3.0;
        let mut prev = remap_angle(0.0, k);
        for i in 1..=1000 {
            let next = remap_angle(i as f32 / 1000.0, k);
            assert!(next > prev, "remap not increasing at step {}", i);
            prev = next;
        }
    }

    #[test]
    fn test_bin_coord_clamps_out_dc() {
        // angle01 = 0 resolves to bin 1, never the DC bin
        assert_eq!(bin_coord(remap_angle(0.0, 3.0), B), 1.0);
        // angle01 = 1 resolves to the last bin
        assert_eq!(bin_coord(remap_angle(1.0, 3.0), B), (B - 1) as f32);
    }

    #[test]
    fn test_kernel_weights_at_texel_centers() {
        let mut snapshot = vec![0u8; B];
        for (i, s) in snapshot.iter_mut().enumerate() {
            *s = (i * 7 % 256) as u8;
        }

        for i in 1..B - 1 {
            let direct = (snapshot[i - 1] as f32
                + 2.0 * snapshot[i] as f32
                + snapshot[i + 1] as f32)
                / (4.0 * 255.0);
            let sampled = sample_smoothed(&snapshot, i as f32);
            assert!(
                (sampled - direct).abs() < 1e-4,
                "kernel mismatch at bin {}: {} vs {}",
                i,
                sampled,
                direct
            );
        }
    }

    #[test]
    fn test_sample_linear_clamps_edges() {
        let snapshot = [10u8, 200u8];
        assert!((sample_linear(&snapshot, -1.0) - 10.0 / 255.0).abs() < 1e-6);
        assert!((sample_linear(&snapshot, 2.0) - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_noise_gate_zeroes_quiet_signal() {
        let params = VisualParams::default();
        // Anything at or below the gate contributes exactly zero glow
        assert_eq!(amplitude_gain(0.01, 10.0, B, &params), 0.0);
        assert_eq!(amplitude_gain(0.005, 10.0, B, &params), 0.0);
        assert!(amplitude_gain(0.02, 10.0, B, &params) > 0.0);
    }

    #[test]
    fn test_circular_mask() {
        let params = VisualParams::default();
        let snapshot = vec![0u8; B];

        // Outside the circle: nothing drawn
        assert!(shade([0.0, 0.0], 1.0, &snapshot, &params).is_none());
        // Center and rim: drawn
        assert!(shade([0.5, 0.5], 1.0, &snapshot, &params).is_some());
        assert!(shade([0.5, 1.0], 1.0, &snapshot, &params).is_some());
    }

    #[test]
    fn test_mask_boundary_is_deterministic() {
        let params = VisualParams::default();
        let snapshot = vec![128u8; B];
        // radius == 1 exactly must resolve the same way on every evaluation
        let uv = [0.5, 1.0];
        let first = shade(uv, 1.0, &snapshot, &params);
        for _ in 0..10 {
            assert_eq!(shade(uv, 1.0, &snapshot, &params), first);
        }
        assert!(first.is_some());
    }

    #[test]
    fn test_aspect_correction_masks_wide_viewport() {
        let params = VisualParams::default();
        let snapshot = vec![0u8; B];
        let wide = 800.0 / 600.0;
        // A point at the horizontal edge is inside for a square viewport
        // but pushed outside the circle once corrected for 800x600
        assert!(shade([0.95, 0.5], 1.0, &snapshot, &params).is_some());
        assert!(shade([0.95, 0.5], wide, &snapshot, &params).is_none());
    }

    #[test]
    fn test_ring_count_maxima() {
        let params = VisualParams::default();
        let count = params.ring_count;
        // Pre-fade, one ring maximum sits at every multiple of 1/count in
        // [0, 1) and the profile is dark everywhere between them
        for m in 0..count {
            let center = m as f32 / count as f32;
            assert!(
                ring_profile(center, count, params.ring_width) > 0.999,
                "no ring maximum at radius {}",
                center
            );
            for off in [0.25, 0.5, 0.75] {
                let between = (m as f32 + off) / count as f32;
                assert_eq!(ring_profile(between, count, params.ring_width), 0.0);
            }
        }
    }

    #[test]
    fn test_rings_fade_at_rim() {
        assert_eq!(ring_fade(0.5), 1.0);
        assert_eq!(ring_fade(1.0), 0.0);
        assert!(ring_fade(0.9) > 0.0 && ring_fade(0.9) < 1.0);
    }

    #[test]
    fn test_single_hot_bin_lights_its_arc() {
        let params = VisualParams::default();
        let mut snapshot = vec![0u8; B];
        snapshot[512] = 255;

        // Invert the remap to find the angle that lands on bin 512
        let k = params.remap_steepness;
        let remapped = 512.0 / (B as f32 - 1.0);
        let a01 = (1.0 + remapped * (k.exp() - 1.0)).ln() / k;

        // Radius 0.5 sits between rings (fract(0.5 * 5) = 0.5), so any
        // brightness difference comes from the glow term alone
        let hot = shade(uv_at_angle(a01, 0.5), 1.0, &snapshot, &params).unwrap();
        let cold = shade(uv_at_angle((a01 + 0.4) % 1.0, 0.5), 1.0, &snapshot, &params).unwrap();

        for c in 0..3 {
            assert!(
                hot[c] > params.base_color[c] + 0.1 * params.glow_color[c],
                "expected bright arc in channel {}",
                c
            );
            assert!((cold[c] - params.base_color[c]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_resize_changes_only_aspect_term() {
        let params = VisualParams::default();
        let mut snapshot = vec![0u8; B];
        snapshot[300] = 220;

        // The same corrected-space point must shade identically under both
        // viewports; only the uv -> corrected mapping differs
        let landscape = 800.0 / 600.0;
        let portrait = 600.0 / 800.0;
        let p = [0.3, -0.4];

        let uv_land = [(p[0] / landscape + 1.0) / 2.0, (p[1] + 1.0) / 2.0];
        let uv_port = [(p[0] / portrait + 1.0) / 2.0, (p[1] + 1.0) / 2.0];

        let a = shade(uv_land, landscape, &snapshot, &params).unwrap();
        let b = shade(uv_port, portrait, &snapshot, &params).unwrap();
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() < 1e-5);
        }
    }
}
