use std::collections::HashMap;

use arcstr::ArcStr;
use indicatif::ProgressBar;
use itertools::iproduct;
use ndarray::Array4;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Gmid22Error, Result};
use crate::oracle::{OracleError, OracleInput, RawQuantity, RawSample, SimulationOracle};
use crate::sweep::TransistorSweep;

/// Characterization data for one transistor model over a 4-D sweep.
///
/// Every raw array shares the fixed axis order (length, vbs, vgs, vds) and
/// the shape of the sweep. Built once, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterizationTable {
    pub model: ArcStr,
    pub sweep: TransistorSweep,
    /// Width at which every grid point was simulated. Physical sizing for
    /// other widths goes through the density-scaling relation in the sizing
    /// engine, not through re-simulation.
    pub ref_width: f64,
    /// Grid coordinates whose oracle call failed to converge. The raw
    /// arrays hold NaN at these coordinates.
    pub failed_points: Vec<[usize; 4]>,
    #[serde(with = "nan_array")]
    id: Array4<f64>,
    #[serde(with = "nan_array")]
    gm: Array4<f64>,
    #[serde(with = "nan_array")]
    gds: Array4<f64>,
    #[serde(with = "nan_array")]
    vth: Array4<f64>,
    #[serde(with = "nan_array")]
    vdsat: Array4<f64>,
    #[serde(with = "nan_array")]
    cgg: Array4<f64>,
    #[serde(with = "nan_array")]
    cgs: Array4<f64>,
    #[serde(with = "nan_array")]
    cgd: Array4<f64>,
}

/// JSON has no literal for non-finite floats, so raw arrays persist as a
/// shape plus per-element `Option<f64>`: `None` marks an invalid sample and
/// reloads as NaN.
mod nan_array {
    use ndarray::Array4;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Packed {
        shape: [usize; 4],
        data: Vec<Option<f64>>,
    }

    pub fn serialize<S: Serializer>(arr: &Array4<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let (a, b, c, d) = arr.dim();
        Packed {
            shape: [a, b, c, d],
            data: arr
                .iter()
                .map(|&x| if x.is_finite() { Some(x) } else { None })
                .collect(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Array4<f64>, D::Error> {
        let packed = Packed::deserialize(deserializer)?;
        let data: Vec<f64> = packed
            .data
            .into_iter()
            .map(|x| x.unwrap_or(f64::NAN))
            .collect();
        Array4::from_shape_vec(packed.shape, data).map_err(serde::de::Error::custom)
    }
}

impl CharacterizationTable {
    pub fn raw(&self, quantity: RawQuantity) -> &Array4<f64> {
        match quantity {
            RawQuantity::Id => &self.id,
            RawQuantity::Gm => &self.gm,
            RawQuantity::Gds => &self.gds,
            RawQuantity::Vth => &self.vth,
            RawQuantity::Vdsat => &self.vdsat,
            RawQuantity::Cgg => &self.cgg,
            RawQuantity::Cgs => &self.cgs,
            RawQuantity::Cgd => &self.cgd,
        }
    }

    /// Shape of every raw array: (L, B, G, D).
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.sweep.shape()
    }
}

/// Builds one [`CharacterizationTable`] by invoking the oracle once per
/// point of the (length x vbs x vgs x vds) cross product.
pub struct TableBuilder {
    model: ArcStr,
    sweep: TransistorSweep,
    ref_width: f64,
    params: HashMap<String, f64>,
    workers: usize,
    progress: bool,
}

impl TableBuilder {
    pub fn new(model: impl Into<ArcStr>, sweep: TransistorSweep, ref_width: f64) -> Self {
        Self {
            model: model.into(),
            sweep,
            ref_width,
            params: HashMap::new(),
            workers: 1,
            progress: false,
        }
    }

    /// Fixed device parameters forwarded to every oracle call.
    pub fn params(mut self, params: HashMap<String, f64>) -> Self {
        self.params = params;
        self
    }

    /// Size of the worker pool used to dispatch grid points. 1 runs the
    /// sweep on the calling thread.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the full sweep against `oracle`.
    ///
    /// A failed oracle call invalidates only its own grid point: the point's
    /// coordinate is recorded and its raw samples stay NaN. Result insertion
    /// is keyed by the point's multi-index, so worker completion order never
    /// affects the final table.
    pub fn build(&self, oracle: &dyn SimulationOracle) -> Result<CharacterizationTable> {
        if !self.ref_width.is_finite() || self.ref_width <= 0.0 {
            return Err(Gmid22Error::Config(format!(
                "reference width must be positive, got {}",
                self.ref_width
            )));
        }

        let (nl, nb, ng, nd) = self.sweep.shape();
        let points: Vec<[usize; 4]> = iproduct!(0..nl, 0..nb, 0..ng, 0..nd)
            .map(|(l, b, g, d)| [l, b, g, d])
            .collect();
        log::info!(
            "characterizing `{}`: {} grid points, {} worker(s)",
            self.model,
            points.len(),
            self.workers
        );

        let pb = if self.progress {
            ProgressBar::new(points.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let eval = |&[l, b, g, d]: &[usize; 4]| {
            let input = OracleInput {
                length: self.sweep.length.values()[l],
                width: self.ref_width,
                vgs: self.sweep.vgs.values()[g],
                vds: self.sweep.vds.values()[d],
                vbs: self.sweep.vbs.values()[b],
                params: &self.params,
            };
            let result = oracle.evaluate(&input);
            pb.inc(1);
            result
        };

        let results: Vec<std::result::Result<RawSample, OracleError>> = if self.workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()?;
            pool.install(|| points.par_iter().map(eval).collect())
        } else {
            points.iter().map(eval).collect()
        };
        pb.finish_and_clear();

        let shape = (nl, nb, ng, nd);
        let mut id = Array4::from_elem(shape, f64::NAN);
        let mut gm = Array4::from_elem(shape, f64::NAN);
        let mut gds = Array4::from_elem(shape, f64::NAN);
        let mut vth = Array4::from_elem(shape, f64::NAN);
        let mut vdsat = Array4::from_elem(shape, f64::NAN);
        let mut cgg = Array4::from_elem(shape, f64::NAN);
        let mut cgs = Array4::from_elem(shape, f64::NAN);
        let mut cgd = Array4::from_elem(shape, f64::NAN);
        let mut failed_points = Vec::new();

        for (&idx, result) in points.iter().zip(results) {
            match result {
                Ok(s) => {
                    id[idx] = s.id;
                    gm[idx] = s.gm;
                    gds[idx] = s.gds;
                    vth[idx] = s.vth;
                    vdsat[idx] = s.vdsat;
                    cgg[idx] = s.cgg;
                    cgs[idx] = s.cgs;
                    cgd[idx] = s.cgd;
                }
                Err(e) => {
                    let [l, b, g, d] = idx;
                    log::warn!(
                        "`{}` point (l={l}, b={b}, g={g}, d={d}) marked invalid: {e}",
                        self.model
                    );
                    failed_points.push(idx);
                }
            }
        }

        if !failed_points.is_empty() {
            log::info!(
                "`{}`: {} of {} grid points failed to converge",
                self.model,
                failed_points.len(),
                points.len()
            );
        }

        Ok(CharacterizationTable {
            model: self.model.clone(),
            sweep: self.sweep.clone(),
            ref_width: self.ref_width,
            failed_points,
            id,
            gm,
            gds,
            vth,
            vdsat,
            cgg,
            cgs,
            cgd,
        })
    }
}

/// Independently built tables keyed by model name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSet {
    tables: HashMap<ArcStr, CharacterizationTable>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: CharacterizationTable) {
        self.tables.insert(table.model.clone(), table);
    }

    pub fn get(&self, model: &str) -> Result<&CharacterizationTable> {
        self.tables
            .get(model)
            .ok_or_else(|| Gmid22Error::UnknownModel(model.to_string()))
    }

    pub fn models(&self) -> impl Iterator<Item = &ArcStr> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
