//! Butterworth band-pass filter in second-order sections.
//!
//! Design follows the classic analog route: low-pass prototype poles,
//! low-pass to band-pass transform, bilinear transform with pre-warping.
//! Sections are normalized to unity gain at the geometric centre frequency.
//! `filtfilt` runs the cascade forward and backward for zero phase, with odd
//! extension at both ends and steady-state initial conditions.

use std::f64::consts::PI;

use nalgebra::Complex;
use tracing::trace;

use crate::error::{Result, SignalError};

/// Imaginary parts below this are treated as real poles
const REAL_POLE_TOLERANCE: f64 = 1e-10;

/// One biquad: `b0 + b1 z^-1 + b2 z^-2` over `1 + a1 z^-1 + a2 z^-2`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    fn from_poles(p1: Complex<f64>, p2: Complex<f64>) -> Self {
        let sum = p1 + p2;
        let product = p1 * p2;
        Self {
            // zeros at z = 1 and z = -1
            b: [1.0, 0.0, -1.0],
            a: [1.0, -sum.re, product.re],
        }
    }

    /// Complex response at `omega` rad/sample
    fn response(&self, omega: f64) -> Complex<f64> {
        let z1 = Complex::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = Complex::new(self.b[0], 0.0) + z1 * self.b[1] + z2 * self.b[2];
        let den = Complex::new(self.a[0], 0.0) + z1 * self.a[1] + z2 * self.a[2];
        num / den
    }

    fn scale_numerator(&mut self, gain: f64) {
        for b in &mut self.b {
            *b *= gain;
        }
    }

    /// Direct-form II transposed step
    #[inline]
    fn step(&self, x: f64, z: &mut [f64; 2]) -> f64 {
        let y = self.b[0] * x + z[0];
        z[0] = self.b[1] * x - self.a[1] * y + z[1];
        z[1] = self.b[2] * x - self.a[2] * y;
        y
    }

    /// Initial state for a unit step input in steady state
    fn step_state(&self) -> [f64; 2] {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        let c0 = b1 - a1 * b0;
        let c1 = b2 - a2 * b0;
        let z0 = (c0 + c1) / (1.0 + a1 + a2);
        [z0, c1 - a2 * z0]
    }

    fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }
}

/// Digital Butterworth band-pass filter
#[derive(Debug, Clone)]
pub struct ButterworthBandpass {
    sections: Vec<Biquad>,
    lowcut_hz: f64,
    highcut_hz: f64,
    sample_rate_hz: f64,
    order: usize,
}

impl ButterworthBandpass {
    /// Design a band-pass of the given order (the cascade has `order` sections).
    ///
    /// # Errors
    /// `InvalidFilter` unless `0 < lowcut < highcut < fs / 2` and `order >= 1`.
    pub fn design(lowcut_hz: f64, highcut_hz: f64, sample_rate_hz: f64, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(SignalError::invalid_filter("order must be >= 1"));
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(SignalError::invalid_filter(format!(
                "sampling rate must be positive, got {sample_rate_hz}"
            )));
        }
        let nyquist = sample_rate_hz / 2.0;
        if !(lowcut_hz > 0.0 && lowcut_hz < highcut_hz && highcut_hz < nyquist) {
            return Err(SignalError::invalid_filter(format!(
                "cutoffs must satisfy 0 < {lowcut_hz} < {highcut_hz} < {nyquist} (Nyquist)"
            )));
        }

        // pre-warp with a normalized sampling rate of 2
        let warp = |hz: f64| 4.0 * (PI * (hz / nyquist) / 2.0).tan();
        let w1 = warp(lowcut_hz);
        let w2 = warp(highcut_hz);
        let bandwidth = w2 - w1;
        let centre = (w1 * w2).sqrt();

        let n = order as f64;
        let mut poles = Vec::with_capacity(2 * order);
        for k in 0..order {
            let m = -n + 1.0 + 2.0 * k as f64;
            let prototype = -Complex::from_polar(1.0, PI * m / (2.0 * n));
            let shifted = prototype * (bandwidth / 2.0);
            let offset = (shifted * shifted - Complex::new(centre * centre, 0.0)).sqrt();
            for analog in [shifted + offset, shifted - offset] {
                let four = Complex::new(4.0, 0.0);
                poles.push((four + analog) / (four - analog));
            }
        }

        let mut sections = pair_poles(&poles);
        let omega_centre = 2.0 * (centre / 4.0).atan();
        for section in &mut sections {
            let magnitude = section.response(omega_centre).norm();
            if magnitude > 0.0 {
                section.scale_numerator(1.0 / magnitude);
            }
        }

        trace!(order, sections = sections.len(), lowcut_hz, highcut_hz, sample_rate_hz, "designed band-pass");

        Ok(Self {
            sections,
            lowcut_hz,
            highcut_hz,
            sample_rate_hz,
            order,
        })
    }

    /// Second-order sections
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Filter order
    pub fn order(&self) -> usize {
        self.order
    }

    /// Pass band in Hz
    pub fn band(&self) -> (f64, f64) {
        (self.lowcut_hz, self.highcut_hz)
    }

    /// Magnitude response at `freq_hz`
    pub fn magnitude(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sample_rate_hz;
        self.sections
            .iter()
            .map(|s| s.response(omega))
            .fold(Complex::new(1.0, 0.0), |acc, h| acc * h)
            .norm()
    }

    /// Minimum padding used by `filtfilt`; inputs must be strictly longer.
    pub fn padlen(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Causal filtering from zero (or the given) initial state
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut state = vec![[0.0; 2]; self.sections.len()];
        self.run(signal.iter().copied(), &mut state)
    }

    /// Zero-phase forward-backward filtering
    ///
    /// # Errors
    /// `SignalTooShort` when `signal.len() <= padlen()`.
    pub fn filtfilt(&self, signal: &[f64]) -> Result<Vec<f64>> {
        let padlen = self.padlen();
        if signal.len() <= padlen {
            return Err(SignalError::SignalTooShort {
                len: signal.len(),
                required: padlen,
            });
        }

        let extended = odd_extend(signal, padlen);
        let zi = self.steady_state();

        let x0 = extended[0];
        let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * x0, z[1] * x0]).collect();
        let forward = self.run(extended.iter().copied(), &mut state);

        let y0 = forward[forward.len() - 1];
        let mut state: Vec<[f64; 2]> = zi.iter().map(|z| [z[0] * y0, z[1] * y0]).collect();
        let mut backward = self.run(forward.iter().rev().copied(), &mut state);
        backward.reverse();

        Ok(backward[padlen..backward.len() - padlen].to_vec())
    }

    fn run(&self, input: impl Iterator<Item = f64>, state: &mut [[f64; 2]]) -> Vec<f64> {
        input
            .map(|x| {
                self.sections
                    .iter()
                    .zip(state.iter_mut())
                    .fold(x, |acc, (section, z)| section.step(acc, z))
            })
            .collect()
    }

    /// Per-section initial state for a unit step, scaled by the upstream DC gain
    fn steady_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z0, z1] = section.step_state();
                let zi = [z0 * scale, z1 * scale];
                scale *= section.dc_gain();
                zi
            })
            .collect()
    }
}

/// Pair conjugate poles, then remaining real poles, into biquads.
fn pair_poles(poles: &[Complex<f64>]) -> Vec<Biquad> {
    let is_real = |p: &Complex<f64>| p.im.abs() <= REAL_POLE_TOLERANCE * (1.0 + p.norm());

    let mut sections: Vec<Biquad> = poles
        .iter()
        .filter(|p| !is_real(p) && p.im > 0.0)
        .map(|p| Biquad::from_poles(*p, p.conj()))
        .collect();

    let mut real: Vec<f64> = poles.iter().filter(|p| is_real(p)).map(|p| p.re).collect();
    real.sort_by(|a, b| a.total_cmp(b));
    for pair in real.chunks(2) {
        let p1 = Complex::new(pair[0], 0.0);
        let p2 = Complex::new(*pair.get(1).unwrap_or(&0.0), 0.0);
        sections.push(Biquad::from_poles(p1, p2));
    }
    sections
}

fn odd_extend(signal: &[f64], padlen: usize) -> Vec<f64> {
    let n = signal.len();
    let first = signal[0];
    let last = signal[n - 1];

    let mut extended = Vec::with_capacity(n + 2 * padlen);
    extended.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));
    extended
}

/// Design and apply a zero-phase band-pass in one call
pub fn bandpass_filter(
    signal: &[f64],
    lowcut_hz: f64,
    highcut_hz: f64,
    sample_rate_hz: f64,
    order: usize,
) -> Result<Vec<f64>> {
    ButterworthBandpass::design(lowcut_hz, highcut_hz, sample_rate_hz, order)?.filtfilt(signal)
}
