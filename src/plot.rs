use std::path::PathBuf;

use plotters::prelude::*;

use crate::derived::{is_admissible, DerivedQuantity};
use crate::design::{DesignResult, DesignSpec, DesignView};
use crate::error::Result;
use crate::table::CharacterizationTable;

pub struct ChartParams<'a> {
    pub table: &'a CharacterizationTable,
    pub spec: &'a DesignSpec,
    /// Quantity drawn against gm/ID.
    pub y: DerivedQuantity,
    /// Operating point to mark, as (gm/ID, y-value).
    pub mark: Option<(f64, f64)>,
    pub output_path: PathBuf,
}

/// One polyline per channel length, restricted to admissible samples.
pub(crate) fn series_vs_gmid(
    view: &DesignView,
    y: DerivedQuantity,
) -> Vec<(String, Vec<(f64, f64)>)> {
    let gmid = view.derived(DerivedQuantity::GmOverId);
    let yv = view.derived(y);
    view.lengths()
        .iter()
        .enumerate()
        .map(|(l, &length)| {
            let pts = (0..view.num_bias_points())
                .filter_map(|g| {
                    let (x, yy) = (gmid[[l, g]], yv[[l, g]]);
                    (is_admissible(x) && is_admissible(yy)).then_some((x, yy))
                })
                .collect();
            (format!("L={:.2}um", length * 1e6), pts)
        })
        .collect()
}

/// Marker coordinates for a sized design on a `y` vs gm/ID chart.
pub fn design_marker(result: &DesignResult, y: DerivedQuantity) -> Option<(f64, f64)> {
    let yv = match y {
        DerivedQuantity::IntrinsicGain => result.expected_gain,
        DerivedQuantity::TransitFrequency => result.ft,
        DerivedQuantity::CurrentDensity => result.id_required / result.width,
        _ => return None,
    };
    Some((result.gmid, yv))
}

/// Draws one design-space chart: `y` against gm/ID, one line per length.
///
/// All styling is local to this function; no global plot state exists
/// anywhere in the crate.
pub fn plot_vs_gmid(params: &ChartParams) -> Result<()> {
    let view = DesignView::new(params.table, params.spec)?;
    let series = series_vs_gmid(&view, params.y);

    let mut pts = series
        .iter()
        .flat_map(|(_, pts)| pts.iter().copied())
        .collect::<Vec<_>>();
    pts.extend(params.mark);
    if pts.is_empty() {
        log::warn!(
            "no admissible samples for {}; skipping chart {:?}",
            params.y.label(),
            params.output_path
        );
        return Ok(());
    }
    let (x_min, x_max) = padded_range(pts.iter().map(|p| p.0));
    let (y_min, y_max) = padded_range(pts.iter().map(|p| p.1));

    let root = BitMapBackend::new(&params.output_path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE).unwrap();

    let mut chart = ChartBuilder::on(&root)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .margin(10)
        .caption(
            format!("{} vs gm/ID", params.y.label()),
            ("sans-serif", 28.0).into_font(),
        )
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .unwrap();

    chart
        .configure_mesh()
        .x_desc("gm/ID (S/A)")
        .y_desc(params.y.label())
        .draw()
        .unwrap();

    for (i, (label, pts)) in series.iter().enumerate() {
        if pts.is_empty() {
            continue;
        }
        let color = Palette99::pick(i).to_rgba();
        chart
            .draw_series(LineSeries::new(pts.iter().copied(), &color))
            .unwrap()
            .label(label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    if let Some((x, y)) = params.mark {
        chart
            .draw_series(std::iter::once(Circle::new((x, y), 6, BLACK.filled())))
            .unwrap()
            .label("design point")
            .legend(|(x, y)| Circle::new((x + 10, y), 4, BLACK.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(RGBColor(240, 240, 240))
        .border_style(BLACK)
        .draw()
        .unwrap();

    // To avoid the IO failure being ignored silently, we manually call the present function
    root.present().expect("Unable to write result to file");
    log::info!("chart saved to {:?}", params.output_path);

    Ok(())
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.01).max(1e-12);
    (lo - pad, hi + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::SquareLawOracle;
    use crate::sweep::{Polarity, SweepAxis, TransistorSweep};
    use crate::table::TableBuilder;

    fn table_and_spec() -> (CharacterizationTable, DesignSpec) {
        let sweep = TransistorSweep::new(
            Polarity::Nmos,
            SweepAxis::from_values(vec![130e-9, 260e-9]).unwrap(),
            SweepAxis::from_values(vec![0.0]).unwrap(),
            SweepAxis::from_range(0.0, 1.2, 0.1).unwrap(),
            SweepAxis::from_values(vec![0.6]).unwrap(),
        )
        .unwrap();
        let oracle = SquareLawOracle::with_defaults(Polarity::Nmos);
        let table = TableBuilder::new("nmos_test", sweep, 10e-6)
            .build(&oracle)
            .unwrap();
        let spec = DesignSpec::builder()
            .target_gmid(10.0)
            .gain_min(10.0)
            .bw_min(100e6)
            .load_cap(100e-15)
            .vdd(1.2)
            .vds(0.6)
            .vbs(0.0)
            // The window spans cutoff on purpose.
            .vgs_range((0.0, 1.2))
            .build()
            .unwrap();
        (table, spec)
    }

    #[test]
    fn series_exclude_inadmissible_samples() {
        let (table, spec) = table_and_spec();
        let view = DesignView::new(&table, &spec).unwrap();
        let series = series_vs_gmid(&view, DerivedQuantity::IntrinsicGain);
        assert_eq!(series.len(), 2);
        for (label, pts) in &series {
            assert!(label.starts_with("L="));
            // Cutoff points (vgs below threshold) must have been dropped.
            assert!(!pts.is_empty());
            assert!(pts.len() < 13);
            for &(x, y) in pts {
                assert!(is_admissible(x));
                assert!(is_admissible(y));
            }
        }
    }

    #[test]
    fn marker_tracks_the_requested_quantity() {
        use crate::design::run_design;
        let (table, spec) = table_and_spec();
        let result = run_design(&table, &spec).unwrap();
        let (x, y) = design_marker(&result, DerivedQuantity::IntrinsicGain).unwrap();
        assert_eq!(x, result.gmid);
        assert_eq!(y, result.expected_gain);
        // Current density recovers the table's density at the chosen point.
        let (_, d) = design_marker(&result, DerivedQuantity::CurrentDensity).unwrap();
        approx::assert_relative_eq!(
            d,
            result.id_required / result.width,
            max_relative = 1e-12
        );
        assert!(design_marker(&result, DerivedQuantity::GmOverId).is_none());
    }
}
