//! Butterworth IIR design and zero-phase filtering.
//!
//! Frequencies here are normalized so that 1.0 is the Nyquist frequency.
//! Design follows the classic path: analog lowpass prototype, analog
//! frequency transformation, bilinear transform, then expansion of the
//! zeros and poles into transfer-function coefficients.

use rustfft::num_complex::Complex;
use std::f64::consts::PI;
use std::fmt;

type Cplx = Complex<f64>;

/// Sampling rate of the normalized digital domain (Nyquist = 1).
const NORMALIZED_FS: f64 = 2.0;

/// Passband shape with normalized critical frequencies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Band {
    Lowpass(f64),
    Highpass(f64),
    Bandpass(f64, f64),
}

/// Digital filter coefficients, `a[0] == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Reasons zero-phase filtering cannot run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The signal is not longer than the edge padding.
    SignalTooShort { len: usize, required: usize },
    /// The steady-state system for the initial conditions is singular.
    UnstableInitialState,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignalTooShort { len, required } => {
                write!(
                    f,
                    "signal has {len} samples but zero-phase filtering needs more than {required}"
                )
            }
            Self::UnstableInitialState => {
                write!(f, "filter has no steady state for a constant input")
            }
        }
    }
}

impl std::error::Error for FilterError {}

struct Zpk {
    zeros: Vec<Cplx>,
    poles: Vec<Cplx>,
    gain: f64,
}

/// Designs an `order`-th order digital Butterworth filter.
///
/// Callers must ensure every critical frequency lies strictly in `(0, 1)`.
#[must_use]
pub fn design(order: usize, band: Band) -> TransferFunction {
    let prototype = analog_prototype(order);

    let analog = match band {
        Band::Lowpass(wn) => to_lowpass(prototype, prewarp(wn)),
        Band::Highpass(wn) => to_highpass(prototype, prewarp(wn)),
        Band::Bandpass(low, high) => {
            let (low, high) = (prewarp(low), prewarp(high));
            to_bandpass(prototype, (low * high).sqrt(), high - low)
        }
    };

    let digital = bilinear(analog);
    let b = poly(&digital.zeros)
        .into_iter()
        .map(|c| c * digital.gain)
        .collect();
    let a = poly(&digital.poles);

    TransferFunction { b, a }
}

fn analog_prototype(order: usize) -> Zpk {
    let n = order as f64;
    let poles = (0..order)
        .map(|k| {
            let m = 1.0 - n + 2.0 * k as f64;
            -Cplx::from_polar(1.0, PI * m / (2.0 * n))
        })
        .collect();
    Zpk {
        zeros: Vec::new(),
        poles,
        gain: 1.0,
    }
}

fn prewarp(wn: f64) -> f64 {
    2.0 * NORMALIZED_FS * (PI * wn / NORMALIZED_FS).tan()
}

fn to_lowpass(proto: Zpk, wo: f64) -> Zpk {
    let degree = proto.poles.len() - proto.zeros.len();
    Zpk {
        zeros: proto.zeros.iter().map(|z| *z * wo).collect(),
        poles: proto.poles.iter().map(|p| *p * wo).collect(),
        gain: proto.gain * wo.powi(degree as i32),
    }
}

fn to_highpass(proto: Zpk, wo: f64) -> Zpk {
    let degree = proto.poles.len() - proto.zeros.len();
    let num: Cplx = proto.zeros.iter().map(|z| -*z).product();
    let den: Cplx = proto.poles.iter().map(|p| -*p).product();

    let mut zeros: Vec<Cplx> = proto.zeros.iter().map(|z| Cplx::from(wo) / *z).collect();
    zeros.extend(std::iter::repeat_n(Cplx::new(0.0, 0.0), degree));

    Zpk {
        zeros,
        poles: proto.poles.iter().map(|p| Cplx::from(wo) / *p).collect(),
        gain: proto.gain * (num / den).re,
    }
}

fn to_bandpass(proto: Zpk, wo: f64, bw: f64) -> Zpk {
    let degree = proto.poles.len() - proto.zeros.len();
    let split = |roots: &[Cplx]| -> Vec<Cplx> {
        let scaled: Vec<Cplx> = roots.iter().map(|r| *r * (bw / 2.0)).collect();
        let offset: Vec<Cplx> = scaled.iter().map(|r| (*r * *r - wo * wo).sqrt()).collect();
        let upper = scaled.iter().zip(&offset).map(|(r, d)| *r + *d);
        let lower = scaled.iter().zip(&offset).map(|(r, d)| *r - *d);
        upper.chain(lower).collect()
    };

    let mut zeros = split(&proto.zeros);
    zeros.extend(std::iter::repeat_n(Cplx::new(0.0, 0.0), degree));

    Zpk {
        zeros,
        poles: split(&proto.poles),
        gain: proto.gain * bw.powi(degree as i32),
    }
}

fn bilinear(analog: Zpk) -> Zpk {
    let fs2 = Cplx::new(2.0 * NORMALIZED_FS, 0.0);
    let degree = analog.poles.len() - analog.zeros.len();

    let num: Cplx = analog.zeros.iter().map(|z| fs2 - *z).product();
    let den: Cplx = analog.poles.iter().map(|p| fs2 - *p).product();

    let mut zeros: Vec<Cplx> = analog
        .zeros
        .iter()
        .map(|z| (fs2 + *z) / (fs2 - *z))
        .collect();
    zeros.extend(std::iter::repeat_n(Cplx::new(-1.0, 0.0), degree));

    Zpk {
        zeros,
        poles: analog.poles.iter().map(|p| (fs2 + *p) / (fs2 - *p)).collect(),
        gain: analog.gain * (num / den).re,
    }
}

/// Expands roots into monic polynomial coefficients, highest power first.
fn poly(roots: &[Cplx]) -> Vec<f64> {
    let mut coeffs = vec![Cplx::new(1.0, 0.0)];
    for root in roots {
        let mut next = coeffs.clone();
        next.push(Cplx::new(0.0, 0.0));
        for (i, c) in coeffs.iter().enumerate() {
            next[i + 1] -= *root * *c;
        }
        coeffs = next;
    }
    // Roots come in conjugate pairs, so imaginary parts cancel.
    coeffs.into_iter().map(|c| c.re).collect()
}

impl TransferFunction {
    /// Number of coefficients after padding `b` and `a` to equal length.
    #[must_use]
    pub fn taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Evaluates the complex response at normalized frequency `w`.
    #[must_use]
    pub fn response(&self, w: f64) -> Cplx {
        let z_inv = Cplx::from_polar(1.0, -PI * w);
        let eval = |coeffs: &[f64]| {
            coeffs
                .iter()
                .rev()
                .fold(Cplx::new(0.0, 0.0), |acc, c| acc * z_inv + *c)
        };
        eval(&self.b) / eval(&self.a)
    }

    fn padded(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.taps();
        let a0 = self.a[0];
        let mut b: Vec<f64> = self.b.iter().map(|c| c / a0).collect();
        let mut a: Vec<f64> = self.a.iter().map(|c| c / a0).collect();
        b.resize(n, 0.0);
        a.resize(n, 0.0);
        (b, a)
    }

    /// Runs the filter forward over `input` (transposed direct form II),
    /// starting from delay state `state`.
    fn run(&self, input: &[f64], mut state: Vec<f64>) -> Vec<f64> {
        let (b, a) = self.padded();
        let n = b.len();

        input
            .iter()
            .map(|&x| {
                let y = b[0] * x + state.first().copied().unwrap_or(0.0);
                for i in 0..n.saturating_sub(2) {
                    state[i] = b[i + 1] * x + state[i + 1] - a[i + 1] * y;
                }
                if n >= 2 {
                    state[n - 2] = b[n - 1] * x - a[n - 1] * y;
                }
                y
            })
            .collect()
    }

    /// Delay state that produces the steady-state response to a unit step.
    fn step_state(&self) -> Result<Vec<f64>, FilterError> {
        let (b, a) = self.padded();
        let n = b.len();
        if n < 2 {
            return Ok(Vec::new());
        }
        let m = n - 1;

        // (I - companion(a)^T) * zi = b[1..] - a[1..] * b[0]
        let mut matrix = vec![vec![0.0; m]; m];
        for (row, line) in matrix.iter_mut().enumerate() {
            line[row] = 1.0;
            line[0] += a[row + 1];
            if row + 1 < m {
                line[row + 1] -= 1.0;
            }
        }
        let rhs: Vec<f64> = (0..m).map(|i| b[i + 1] - a[i + 1] * b[0]).collect();

        solve(matrix, rhs).ok_or(FilterError::UnstableInitialState)
    }

    /// Applies the filter forward and then backward, cancelling its phase.
    ///
    /// Both ends of the signal are extended by odd reflection over
    /// `3 * taps` samples, and each pass starts from the steady state for
    /// its first sample, which suppresses start-up transients.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::SignalTooShort`] if `input` is not longer
    /// than the padding.
    pub fn filtfilt(&self, input: &[f64]) -> Result<Vec<f64>, FilterError> {
        let edge = 3 * self.taps();
        let len = input.len();
        if len <= edge {
            return Err(FilterError::SignalTooShort {
                len,
                required: edge,
            });
        }

        let first = input[0];
        let last = input[len - 1];
        let mut extended = Vec::with_capacity(len + 2 * edge);
        extended.extend((1..=edge).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((1..=edge).map(|i| 2.0 * last - input[len - 1 - i]));

        let zi = self.step_state()?;
        let scaled = |start: f64| zi.iter().map(|z| z * start).collect::<Vec<_>>();

        let mut forward = self.run(&extended, scaled(extended[0]));
        forward.reverse();
        let mut backward = self.run(&forward, scaled(forward[0]));
        backward.reverse();

        Ok(backward[edge..edge + len].to_vec())
    }
}

/// Solves `matrix * x = rhs` by Gaussian elimination with partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| matrix[i][col].abs().total_cmp(&matrix[j][col].abs()))?;
        if matrix[pivot][col].abs() < 1e-300 {
            return None;
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * x[k]).sum();
        x[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(x)
}
