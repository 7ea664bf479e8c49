use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use ndarray::{Array, Array4, Dimension, Zip};
use serde::{Deserialize, Serialize};

use crate::oracle::RawQuantity;
use crate::table::CharacterizationTable;

/// Figures of merit derived from the raw arrays.
///
/// The set is closed on purpose: every physically meaningful derived
/// quantity of this methodology is named here, and evaluation is a pure
/// elementwise function of the raw arrays. Evaluating the same quantity
/// twice on the same table yields bit-identical output, including the
/// placement of non-finite markers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedQuantity {
    /// gm / Id (S/A).
    GmOverId,
    /// gm / (2*pi*cgg) (Hz).
    TransitFrequency,
    /// gm / gds (V/V).
    IntrinsicGain,
    /// Id / W (A/m).
    CurrentDensity,
    /// gm / W (S/m).
    TransconductanceDensity,
}

impl DerivedQuantity {
    pub const ALL: [DerivedQuantity; 5] = [
        DerivedQuantity::GmOverId,
        DerivedQuantity::TransitFrequency,
        DerivedQuantity::IntrinsicGain,
        DerivedQuantity::CurrentDensity,
        DerivedQuantity::TransconductanceDensity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DerivedQuantity::GmOverId => "gm/ID (S/A)",
            DerivedQuantity::TransitFrequency => "fT (Hz)",
            DerivedQuantity::IntrinsicGain => "gm/gds (V/V)",
            DerivedQuantity::CurrentDensity => "ID/W (A/m)",
            DerivedQuantity::TransconductanceDensity => "gm/W (S/m)",
        }
    }

    /// Evaluates this quantity over the full table. The output has the raw
    /// array shape; inadmissible inputs and zero denominators come out NaN.
    pub fn evaluate(&self, table: &CharacterizationTable) -> Array4<f64> {
        self.evaluate_parts(|q| table.raw(q).clone(), table.ref_width)
    }

    /// Dimension-generic core shared by full-table and sliced evaluation.
    pub(crate) fn evaluate_parts<D, F>(&self, raw: F, ref_width: f64) -> Array<f64, D>
    where
        D: Dimension,
        F: Fn(RawQuantity) -> Array<f64, D>,
    {
        match self {
            DerivedQuantity::GmOverId => ratio(&raw(RawQuantity::Gm), &raw(RawQuantity::Id)),
            DerivedQuantity::TransitFrequency => {
                let cgg = raw(RawQuantity::Cgg).mapv(|c| 2.0 * PI * c);
                ratio(&raw(RawQuantity::Gm), &cgg)
            }
            DerivedQuantity::IntrinsicGain => ratio(&raw(RawQuantity::Gm), &raw(RawQuantity::Gds)),
            DerivedQuantity::CurrentDensity => scale_by_width(raw(RawQuantity::Id), ref_width),
            DerivedQuantity::TransconductanceDensity => {
                scale_by_width(raw(RawQuantity::Gm), ref_width)
            }
        }
    }
}

impl Display for DerivedQuantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A sample is admissible only if it is finite and strictly positive.
///
/// Currents, gains, and frequencies are physically meaningless otherwise;
/// every reduction in this crate filters on this predicate before taking
/// extrema or ratios.
#[inline]
pub fn is_admissible(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

fn ratio<D: Dimension>(num: &Array<f64, D>, den: &Array<f64, D>) -> Array<f64, D> {
    Zip::from(num)
        .and(den)
        .map_collect(|&n, &d| if d == 0.0 { f64::NAN } else { n / d })
}

fn scale_by_width<D: Dimension>(num: Array<f64, D>, width: f64) -> Array<f64, D> {
    if !width.is_finite() || width <= 0.0 {
        return num.mapv(|_| f64::NAN);
    }
    num.mapv(|x| x / width)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::oracle::{OracleError, OracleInput, SimulationOracle, SquareLawOracle};
    use crate::sweep::{Polarity, SweepAxis, TransistorSweep};
    use crate::table::TableBuilder;
    use crate::tests::FnOracle;

    fn char_table() -> CharacterizationTable {
        let sweep = TransistorSweep::new(
            Polarity::Nmos,
            SweepAxis::from_values(vec![130e-9, 390e-9]).unwrap(),
            SweepAxis::from_values(vec![0.0]).unwrap(),
            SweepAxis::from_range(0.0, 1.2, 0.2).unwrap(),
            SweepAxis::from_range(0.3, 1.2, 0.3).unwrap(),
        )
        .unwrap();
        // Poison one interior point so derived outputs carry a NaN marker.
        let oracle = FnOracle(|input: &OracleInput| {
            if (input.vgs - 0.8).abs() < 1e-9 && (input.vds - 0.6).abs() < 1e-9 {
                Err(OracleError::Convergence)
            } else {
                SquareLawOracle::with_defaults(Polarity::Nmos).evaluate(input)
            }
        });
        TableBuilder::new("nmos_test", sweep, 10e-6)
            .build(&oracle)
            .unwrap()
    }

    #[test]
    fn output_shape_matches_raw_shape() {
        let table = char_table();
        for q in DerivedQuantity::ALL {
            assert_eq!(q.evaluate(&table).dim(), table.shape());
        }
    }

    #[test]
    fn evaluation_is_deterministic() {
        let table = char_table();
        for q in DerivedQuantity::ALL {
            let a = q.evaluate(&table);
            let b = q.evaluate(&table);
            for (x, y) in a.iter().zip(b.iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn zero_denominator_becomes_nan() {
        let table = char_table();
        // At vgs = 0 the device is cut off: id = gm = 0, so gm/ID is 0/0.
        let gmid = DerivedQuantity::GmOverId.evaluate(&table);
        assert!(gmid[[0, 0, 0, 0]].is_nan());
        // Intrinsic gain divides by gds = 0 in cutoff.
        let gain = DerivedQuantity::IntrinsicGain.evaluate(&table);
        assert!(gain[[0, 0, 0, 0]].is_nan());
    }

    #[test]
    fn failed_points_propagate_as_nan() {
        let table = char_table();
        assert!(!table.failed_points.is_empty());
        for q in DerivedQuantity::ALL {
            let arr = q.evaluate(&table);
            for &idx in &table.failed_points {
                assert!(arr[idx].is_nan());
            }
        }
    }

    #[test]
    fn densities_rescale_by_reference_width() {
        let table = char_table();
        let idx = [0, 0, 6, 3];
        let id = table.raw(RawQuantity::Id)[idx];
        assert!(is_admissible(id));
        let density = DerivedQuantity::CurrentDensity.evaluate(&table)[idx];
        assert_relative_eq!(density, id / 10e-6, max_relative = 1e-12);
    }

    #[test]
    fn admissibility_filter() {
        assert!(is_admissible(1.0e-6));
        assert!(!is_admissible(0.0));
        assert!(!is_admissible(-1.0));
        assert!(!is_admissible(f64::NAN));
        assert!(!is_admissible(f64::INFINITY));
    }
}
