use std::f64::consts::PI;
use std::fmt::{Display, Formatter};

use arcstr::ArcStr;
use serde::Serialize;

use crate::derived::is_admissible;
use crate::design::search::DesignOutcome;
use crate::design::{DesignSpec, OperatingPoint};
use crate::error::{Gmid22Error, Result};

/// Geometry and bias synthesized from one operating point.
///
/// Width comes from rescaling the fixed-width characterization through the
/// current-density relation `W = Id / (Id/W)`. This assumes current density
/// and gm/ID are width-invariant, which holds for unit-width scaling of a
/// MOSFET model at fixed length and bias but not across different lengths
/// or where narrow-width effects matter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignResult {
    pub model: ArcStr,
    pub outcome: DesignOutcome,
    /// Selected channel length (m).
    pub length: f64,
    /// Synthesized channel width (m).
    pub width: f64,
    /// Gate bias of the selected operating point (V).
    pub vgs: f64,
    pub vds: f64,
    pub vbs: f64,
    pub vdd: f64,
    /// gm/ID at the selected operating point (S/A).
    pub gmid: f64,
    /// Transconductance required by the bandwidth target (S).
    pub gm_required: f64,
    /// Drain current required to reach `gm_required` (A).
    pub id_required: f64,
    /// Intrinsic gain at the operating point; unchanged by width scaling.
    pub expected_gain: f64,
    pub expected_gain_db: f64,
    /// Transit frequency at the operating point (Hz).
    pub ft: f64,
    /// fT / BW. A margin near 1x undermines the single-pole bandwidth
    /// model this sizing rests on.
    pub ft_margin: f64,
}

impl Display for DesignResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "---- Design Result ({}) ----", self.model)?;
        writeln!(
            f,
            "outcome: {}",
            match self.outcome {
                DesignOutcome::RequirementMet => "requirement met",
                DesignOutcome::BestEffort => "best effort (gain floor unmet)",
            }
        )?;
        writeln!(f, "L = {:.4} um", self.length * 1e6)?;
        writeln!(f, "W = {:.4} um", self.width * 1e6)?;
        writeln!(f, "VGS = {:.4} V (VDS = {:.2} V, VBS = {:.2} V)", self.vgs, self.vds, self.vbs)?;
        writeln!(f, "ID = {:.4} uA", self.id_required * 1e6)?;
        writeln!(f, "gm = {:.4} uS", self.gm_required * 1e6)?;
        writeln!(f, "gm/ID = {:.2} S/A", self.gmid)?;
        writeln!(
            f,
            "Av = {:.1} V/V ({:.1} dB)",
            self.expected_gain, self.expected_gain_db
        )?;
        writeln!(f, "fT = {:.3} GHz ({:.1}x BW margin)", self.ft * 1e-9, self.ft_margin)?;
        writeln!(f, "-----------------------------")
    }
}

/// Step 3: dimension synthesis.
///
/// Pure arithmetic over the operating point: the single-pole relation
/// `gm = 2*pi*BW*CL` fixes the required transconductance, gm/ID fixes the
/// drain current, and current density fixes the width. An operating point
/// with zero or non-finite gm/ID or current density cannot be dimensioned
/// and is rejected outright rather than producing an infinite width.
pub fn synthesize(
    model: ArcStr,
    spec: &DesignSpec,
    op: &OperatingPoint,
    outcome: DesignOutcome,
) -> Result<DesignResult> {
    let gm_required = 2.0 * PI * spec.bw_min * spec.load_cap;

    if !is_admissible(op.gmid) {
        return Err(Gmid22Error::InvalidOperatingPoint(format!(
            "gm/ID = {} at L = {:.3e} m, VGS = {:.3} V",
            op.gmid, op.length, op.vgs
        )));
    }
    let id_required = gm_required / op.gmid;

    if !is_admissible(op.current_density) {
        return Err(Gmid22Error::InvalidOperatingPoint(format!(
            "ID/W = {} at L = {:.3e} m, VGS = {:.3} V",
            op.current_density, op.length, op.vgs
        )));
    }
    let width = id_required / op.current_density;

    let expected_gain = op.gain;
    let expected_gain_db = if is_admissible(expected_gain) {
        20.0 * expected_gain.log10()
    } else {
        f64::NAN
    };

    let ft_margin = op.ft / spec.bw_min;
    if !is_admissible(ft_margin) || ft_margin < 10.0 {
        log::warn!(
            "fT margin is {ft_margin:.2}x; the single-pole bandwidth model wants fT well above BW"
        );
    }

    Ok(DesignResult {
        model,
        outcome,
        length: op.length,
        width,
        vgs: op.vgs,
        vds: spec.vds,
        vbs: spec.vbs,
        vdd: spec.vdd,
        gmid: op.gmid,
        gm_required,
        id_required,
        expected_gain,
        expected_gain_db,
        ft: op.ft,
        ft_margin,
    })
}
