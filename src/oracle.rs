use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sweep::Polarity;

/// Raw quantities reported by the simulation oracle at each grid point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawQuantity {
    Id,
    Gm,
    Gds,
    Vth,
    Vdsat,
    Cgg,
    Cgs,
    Cgd,
}

impl RawQuantity {
    pub const ALL: [RawQuantity; 8] = [
        RawQuantity::Id,
        RawQuantity::Gm,
        RawQuantity::Gds,
        RawQuantity::Vth,
        RawQuantity::Vdsat,
        RawQuantity::Cgg,
        RawQuantity::Cgs,
        RawQuantity::Cgd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RawQuantity::Id => "id",
            RawQuantity::Gm => "gm",
            RawQuantity::Gds => "gds",
            RawQuantity::Vth => "vth",
            RawQuantity::Vdsat => "vdsat",
            RawQuantity::Cgg => "cgg",
            RawQuantity::Cgs => "cgs",
            RawQuantity::Cgd => "cgd",
        }
    }
}

impl Display for RawQuantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One simulated sample: the eight raw quantities at a single grid point.
///
/// Currents, conductances, and capacitances are magnitudes for both
/// polarities; `vth` and `vdsat` retain the polarity's sign.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub id: f64,
    pub gm: f64,
    pub gds: f64,
    pub vth: f64,
    pub vdsat: f64,
    pub cgg: f64,
    pub cgs: f64,
    pub cgd: f64,
}

impl RawSample {
    pub fn get(&self, quantity: RawQuantity) -> f64 {
        match quantity {
            RawQuantity::Id => self.id,
            RawQuantity::Gm => self.gm,
            RawQuantity::Gds => self.gds,
            RawQuantity::Vth => self.vth,
            RawQuantity::Vdsat => self.vdsat,
            RawQuantity::Cgg => self.cgg,
            RawQuantity::Cgs => self.cgs,
            RawQuantity::Cgd => self.cgd,
        }
    }
}

/// Geometry, bias, and fixed device parameters for one oracle invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleInput<'a> {
    pub length: f64,
    pub width: f64,
    pub vgs: f64,
    pub vds: f64,
    pub vbs: f64,
    pub params: &'a HashMap<String, f64>,
}

/// Per-point oracle failure. Non-fatal to a table build: the builder records
/// the point as invalid and continues.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("operating point failed to converge")]
    Convergence,
    #[error("oracle error: {0}")]
    Other(String),
}

/// The external black-box simulator.
///
/// Implementations wrap a circuit simulator (or an analytical model) that,
/// given geometry and bias, returns the raw small-signal quantities of one
/// transistor. Implementations must be `Sync`: the table builder may invoke
/// `evaluate` from multiple worker threads at once.
pub trait SimulationOracle: Sync {
    fn evaluate(&self, input: &OracleInput) -> std::result::Result<RawSample, OracleError>;
}

/// Parameters for the built-in square-law reference model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SquareLawParams {
    /// Process transconductance u0*Cox (A/V^2).
    pub kp: f64,
    /// Zero-bias threshold voltage magnitude (V).
    pub vth0: f64,
    /// Body-effect coefficient (V^0.5).
    pub gamma: f64,
    /// Surface potential 2*phi_F (V).
    pub phi: f64,
    /// Channel-length modulation at the reference length (1/V).
    pub lambda0: f64,
    /// Length at which `lambda0` applies (m).
    pub lref: f64,
    /// Gate oxide capacitance per area (F/m^2).
    pub cox: f64,
    /// Gate overlap capacitance per width (F/m).
    pub cov: f64,
}

impl Default for SquareLawParams {
    fn default() -> Self {
        Self {
            kp: 200e-6,
            vth0: 0.45,
            gamma: 0.4,
            phi: 0.8,
            lambda0: 0.15,
            lref: 130e-9,
            cox: 8e-3,
            cov: 3e-10,
        }
    }
}

/// Square-law MOSFET oracle.
///
/// A level-1 analytical stand-in for a real simulator: cutoff, triode, and
/// saturation regions, channel-length modulation scaled by 1/L, and a
/// body-effect threshold shift. Useful for tests and for demonstrating the
/// characterization flow end to end; production flows implement
/// [`SimulationOracle`] against their own simulator.
#[derive(Debug, Clone)]
pub struct SquareLawOracle {
    polarity: Polarity,
    params: SquareLawParams,
}

impl SquareLawOracle {
    pub fn new(polarity: Polarity, params: SquareLawParams) -> Self {
        Self { polarity, params }
    }

    pub fn with_defaults(polarity: Polarity) -> Self {
        Self::new(polarity, SquareLawParams::default())
    }
}

impl SimulationOracle for SquareLawOracle {
    fn evaluate(&self, input: &OracleInput) -> std::result::Result<RawSample, OracleError> {
        let p = &self.params;
        // Mirror PMOS bias into NMOS terms; magnitudes come back out.
        let sign = match self.polarity {
            Polarity::Nmos => 1.0,
            Polarity::Pmos => -1.0,
        };
        let (vgs, vds, vbs) = (sign * input.vgs, sign * input.vds, sign * input.vbs);

        let body = p.phi - vbs;
        if body < 0.0 {
            // Forward body bias beyond the surface potential; the underlying
            // model has no solution here, as a simulator would report.
            return Err(OracleError::Convergence);
        }
        let vth = p.vth0 + p.gamma * (body.sqrt() - p.phi.sqrt());
        let vov = vgs - vth;
        let lambda = p.lambda0 * p.lref / input.length;
        let beta = p.kp * input.width / input.length;
        let cgate = p.cox * input.width * input.length;
        let covw = p.cov * input.width;

        let (id, gm, gds, vdsat, cgg, cgs, cgd);
        if vov <= 0.0 {
            // Cutoff. No channel charge; only overlap capacitance remains.
            id = 0.0;
            gm = 0.0;
            gds = 0.0;
            vdsat = 0.0;
            cgg = 2.0 * covw;
            cgs = covw;
            cgd = covw;
        } else if vds < vov {
            // Triode.
            let clm = 1.0 + lambda * vds;
            id = beta * (vov * vds - 0.5 * vds * vds) * clm;
            gm = beta * vds * clm;
            gds = beta * (vov - vds) * clm + beta * (vov * vds - 0.5 * vds * vds) * lambda;
            vdsat = vov;
            cgg = cgate + 2.0 * covw;
            cgs = 0.5 * cgate + covw;
            cgd = 0.5 * cgate + covw;
        } else {
            // Saturation.
            let clm = 1.0 + lambda * vds;
            id = 0.5 * beta * vov * vov * clm;
            gm = beta * vov * clm;
            gds = 0.5 * beta * vov * vov * lambda;
            vdsat = vov;
            cgg = 2.0 / 3.0 * cgate + 2.0 * covw;
            cgs = 2.0 / 3.0 * cgate + covw;
            cgd = covw;
        }

        Ok(RawSample {
            id,
            gm,
            gds,
            vth: sign * vth,
            vdsat: sign * vdsat,
            cgg,
            cgs,
            cgd,
        })
    }
}
