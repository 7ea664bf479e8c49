use derive_builder::Builder;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::derived::DerivedQuantity;
use crate::error::{Gmid22Error, Result};
use crate::oracle::RawQuantity;
use crate::table::CharacterizationTable;

pub mod search;
pub mod sizing;

pub use search::{DesignOutcome, LengthAnalysis, LengthSelection};
pub use sizing::DesignResult;

fn default_reference_gmid() -> f64 {
    10.0
}

/// Externally supplied targets for one design request.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Debug))]
pub struct DesignSpec {
    /// Target gm/ID operating point (S/A).
    pub target_gmid: f64,
    /// Minimum acceptable intrinsic gain (V/V).
    pub gain_min: f64,
    /// Minimum acceptable small-signal bandwidth (Hz).
    pub bw_min: f64,
    /// Load capacitance (F).
    pub load_cap: f64,
    /// Supply voltage (V). Carried through for reporting and netlist
    /// emission; the search itself never consults it.
    pub vdd: f64,
    /// Drain-source bias at which the table is consulted (V).
    pub vds: f64,
    /// Body-source bias at which the table is consulted (V).
    pub vbs: f64,
    /// Gate bias window over which candidate points are drawn (V).
    pub vgs_range: (f64, f64),
    /// gm/ID at which per-length gains are compared during length
    /// selection (S/A). An engineering convention, not a derived value.
    #[builder(default = "10.0")]
    #[serde(default = "default_reference_gmid")]
    pub reference_gmid: f64,
}

impl DesignSpec {
    #[inline]
    pub fn builder() -> DesignSpecBuilder {
        DesignSpecBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("target_gmid", self.target_gmid),
            ("gain_min", self.gain_min),
            ("bw_min", self.bw_min),
            ("load_cap", self.load_cap),
            ("reference_gmid", self.reference_gmid),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Gmid22Error::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// The (length x Vgs) design plane: a table restricted to the nearest grid
/// indices of a fixed Vds/Vbs bias point and to a Vgs window.
pub struct DesignView<'a> {
    pub table: &'a CharacterizationTable,
    vbs_idx: usize,
    vds_idx: usize,
    /// Inclusive index window into the full Vgs axis.
    vgs_window: (usize, usize),
}

impl<'a> DesignView<'a> {
    pub fn new(table: &'a CharacterizationTable, spec: &DesignSpec) -> Result<Self> {
        let vbs_idx = table.sweep.vbs.nearest_index(spec.vbs);
        let vds_idx = table.sweep.vds.nearest_index(spec.vds);

        let (a, b) = spec.vgs_range;
        let (lo, hi) = (a.min(b), a.max(b));
        let vgs = table.sweep.vgs.values();
        let in_window: Vec<usize> = vgs
            .iter()
            .enumerate()
            .filter(|(_, &v)| v >= lo && v <= hi)
            .map(|(i, _)| i)
            .collect();
        let first = *in_window.first().ok_or_else(|| {
            Gmid22Error::Config(format!(
                "vgs window ({a}, {b}) contains no sweep samples of `{}`",
                table.model
            ))
        })?;
        let last = *in_window.last().expect("window is non-empty");

        Ok(Self {
            table,
            vbs_idx,
            vds_idx,
            vgs_window: (first, last),
        })
    }

    /// Number of Vgs samples inside the window.
    pub fn num_bias_points(&self) -> usize {
        self.vgs_window.1 - self.vgs_window.0 + 1
    }

    pub fn lengths(&self) -> &[f64] {
        self.table.sweep.length.values()
    }

    /// Index into the full Vgs axis for a window-relative bias index.
    pub fn full_vgs_index(&self, bias_idx: usize) -> usize {
        self.vgs_window.0 + bias_idx
    }

    pub fn vgs_at(&self, bias_idx: usize) -> f64 {
        self.table.sweep.vgs.values()[self.full_vgs_index(bias_idx)]
    }

    /// 2-D (length x Vgs-window) slice of a raw quantity.
    pub fn raw(&self, quantity: RawQuantity) -> Array2<f64> {
        self.table
            .raw(quantity)
            .slice(s![
                ..,
                self.vbs_idx,
                self.vgs_window.0..=self.vgs_window.1,
                self.vds_idx
            ])
            .to_owned()
    }

    /// 2-D (length x Vgs-window) slice of a derived quantity.
    pub fn derived(&self, quantity: DerivedQuantity) -> Array2<f64> {
        quantity.evaluate_parts(|q| self.raw(q), self.table.ref_width)
    }

    /// Samples the raw and derived values at one (length, bias) coordinate.
    pub fn operating_point(&self, length_idx: usize, bias_idx: usize) -> OperatingPoint {
        let vgs_idx = self.full_vgs_index(bias_idx);
        let idx = [length_idx, self.vbs_idx, vgs_idx, self.vds_idx];
        let id = self.table.raw(RawQuantity::Id)[idx];
        let gm = self.table.raw(RawQuantity::Gm)[idx];
        let gds = self.table.raw(RawQuantity::Gds)[idx];
        let cgg = self.table.raw(RawQuantity::Cgg)[idx];

        OperatingPoint {
            length_idx,
            vgs_idx,
            length: self.table.sweep.length.values()[length_idx],
            vgs: self.table.sweep.vgs.values()[vgs_idx],
            gmid: sratio(gm, id),
            gain: sratio(gm, gds),
            current_density: sratio(id, self.table.ref_width),
            ft: sratio(gm, 2.0 * std::f64::consts::PI * cgg),
        }
    }
}

fn sratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        f64::NAN
    } else {
        num / den
    }
}

/// One selected (length, bias) grid coordinate plus the values sampled
/// there. Produced and consumed within a single design run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperatingPoint {
    pub length_idx: usize,
    /// Index into the full Vgs axis.
    pub vgs_idx: usize,
    pub length: f64,
    pub vgs: f64,
    pub gmid: f64,
    pub gain: f64,
    pub current_density: f64,
    pub ft: f64,
}

/// Runs the full design flow against one characterized model:
/// length selection, bias selection, then dimension synthesis.
pub fn run_design(table: &CharacterizationTable, spec: &DesignSpec) -> Result<DesignResult> {
    spec.validate()?;
    let view = DesignView::new(table, spec)?;

    let analysis = search::analyze_gain_vs_length(&view, spec.reference_gmid)?;
    let selection = search::select_length(&analysis, spec.gain_min);
    match selection.outcome {
        DesignOutcome::RequirementMet => log::info!(
            "selected L = {:.3e} m: gain {:.1} V/V at gm/ID = {} S/A meets floor {:.1}",
            analysis.lengths[selection.index],
            analysis.gain_at_reference[selection.index],
            spec.reference_gmid,
            spec.gain_min,
        ),
        DesignOutcome::BestEffort => log::warn!(
            "no channel length meets gain floor {:.1} V/V; degrading to max-gain L = {:.3e} m",
            spec.gain_min,
            analysis.lengths[selection.index],
        ),
    }

    let bias_idx = search::select_bias(&view, selection.index, spec.target_gmid)?;
    let op = view.operating_point(selection.index, bias_idx);
    log::info!(
        "operating point: vgs = {:.3} V, gm/ID = {:.2} S/A, gain = {:.1} V/V, fT = {:.3e} Hz",
        op.vgs,
        op.gmid,
        op.gain,
        op.ft
    );

    sizing::synthesize(table.model.clone(), spec, &op, selection.outcome)
}
