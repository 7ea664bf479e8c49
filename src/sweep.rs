use serde::{Deserialize, Serialize};

use crate::error::{Gmid22Error, Result};

/// Relative tolerance used when deciding whether a range endpoint lands on
/// the final step.
const STEP_TOL: f64 = 1e-9;

/// Sample points for one swept variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SweepPoints {
    /// Explicit, ordered sample values.
    Values(Vec<f64>),
    /// Linear range from `start` to `stop` in increments of `step`.
    ///
    /// The range is stop-inclusive within a half-step tolerance:
    /// `(0, 1.5, 0.01)` yields 151 points; `(0, 1.0, 0.3)` yields 4 points
    /// ending at 0.9.
    Range { start: f64, stop: f64, step: f64 },
}

/// An ordered, strictly monotonic sequence of sample points for one
/// independent variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    values: Vec<f64>,
}

impl SweepAxis {
    pub fn new(points: &SweepPoints) -> Result<Self> {
        match points {
            SweepPoints::Values(values) => Self::from_values(values.clone()),
            SweepPoints::Range { start, stop, step } => Self::from_range(*start, *stop, *step),
        }
    }

    pub fn from_values(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(Gmid22Error::Config("sweep axis must be non-empty".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Gmid22Error::Config(
                "sweep axis values must be finite".to_string(),
            ));
        }
        let ascending = values.windows(2).all(|w| w[1] > w[0]);
        let descending = values.windows(2).all(|w| w[1] < w[0]);
        if values.len() > 1 && !ascending && !descending {
            return Err(Gmid22Error::Config(
                "sweep axis values must be strictly monotonic".to_string(),
            ));
        }
        Ok(Self { values })
    }

    pub fn from_range(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !start.is_finite() || !stop.is_finite() || !step.is_finite() {
            return Err(Gmid22Error::Config(
                "sweep range bounds and step must be finite".to_string(),
            ));
        }
        if step == 0.0 {
            return Err(Gmid22Error::Config("sweep step must be nonzero".to_string()));
        }
        let span = stop - start;
        if span != 0.0 && span.signum() != step.signum() {
            return Err(Gmid22Error::Config(format!(
                "sweep step {step} does not approach stop {stop} from start {start}"
            )));
        }
        let count = (span / step + STEP_TOL * (span / step).abs().max(1.0)).floor() as usize + 1;
        let values = (0..count).map(|i| start + i as f64 * step).collect();
        Ok(Self { values })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index of the sample nearest `target` (first occurrence on ties).
    pub fn nearest_index(&self, target: f64) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            let dist = (v - target).abs();
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

/// Device polarity. Determines the sign convention of the voltage axes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Nmos,
    Pmos,
}

impl Polarity {
    /// Sign of gate and drain bias voltages for this polarity.
    fn bias_sign(&self) -> f64 {
        match self {
            Polarity::Nmos => 1.0,
            Polarity::Pmos => -1.0,
        }
    }
}

/// The discrete grid of independent variables over which one device is
/// characterized.
///
/// Axis order everywhere downstream is (length, vbs, vgs, vds); permuting it
/// requires updating every consumer of the raw arrays at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransistorSweep {
    pub polarity: Polarity,
    pub length: SweepAxis,
    pub vbs: SweepAxis,
    pub vgs: SweepAxis,
    pub vds: SweepAxis,
}

impl TransistorSweep {
    /// Groups four validated axes under one polarity.
    ///
    /// Gate and drain bias must carry the polarity's sign (non-negative for
    /// NMOS, non-positive for PMOS); body bias carries the opposite sign.
    /// No downstream consumer performs absolute-value conversion.
    pub fn new(
        polarity: Polarity,
        length: SweepAxis,
        vbs: SweepAxis,
        vgs: SweepAxis,
        vds: SweepAxis,
    ) -> Result<Self> {
        if length.values().iter().any(|&l| l <= 0.0) {
            return Err(Gmid22Error::Config(
                "channel lengths must be strictly positive".to_string(),
            ));
        }
        let sign = polarity.bias_sign();
        for (name, axis) in [("vgs", &vgs), ("vds", &vds)] {
            if axis.values().iter().any(|&v| v * sign < 0.0) {
                return Err(Gmid22Error::Config(format!(
                    "{name} axis sign is inconsistent with {polarity:?} polarity"
                )));
            }
        }
        if vbs.values().iter().any(|&v| v * sign > 0.0) {
            return Err(Gmid22Error::Config(format!(
                "vbs axis sign is inconsistent with {polarity:?} polarity"
            )));
        }
        Ok(Self {
            polarity,
            length,
            vbs,
            vgs,
            vds,
        })
    }

    /// Shape of the raw arrays built over this sweep: (L, B, G, D).
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (
            self.length.len(),
            self.vbs.len(),
            self.vgs.len(),
            self.vds.len(),
        )
    }

    pub fn num_points(&self) -> usize {
        let (l, b, g, d) = self.shape();
        l * b * g * d
    }
}
