use std::path::Path;

use tera::Context;

use crate::design::DesignResult;
use crate::error::Result;
use crate::TEMPLATES;

/// Renders an ngspice operating-point verification netlist for a sized
/// device. Pure templating; running the simulation is the caller's concern.
pub fn render_verify_netlist(
    result: &DesignResult,
    model_lib: &str,
    lib_section: &str,
) -> Result<String> {
    let mut ctx = Context::new();
    ctx.insert("model", result.model.as_str());
    ctx.insert("lib", model_lib);
    ctx.insert("section", lib_section);
    ctx.insert("l", &format!("{:.6e}", result.length));
    ctx.insert("w", &format!("{:.6e}", result.width));
    ctx.insert("l_um", &format!("{:.4}", result.length * 1e6));
    ctx.insert("w_um", &format!("{:.4}", result.width * 1e6));
    ctx.insert("vgs", &format!("{:.4}", result.vgs));
    ctx.insert("vds", &format!("{:.4}", result.vds));
    ctx.insert("vbs", &format!("{:.4}", result.vbs));
    ctx.insert("id_ua", &format!("{:.4}", result.id_required * 1e6));
    ctx.insert("gm_us", &format!("{:.4}", result.gm_required * 1e6));
    ctx.insert("gain", &format!("{:.2}", result.expected_gain));
    ctx.insert("gain_db", &format!("{:.1}", result.expected_gain_db));
    Ok(TEMPLATES.render("verify_op.spice", &ctx)?)
}

pub fn write_verify_netlist(
    result: &DesignResult,
    model_lib: &str,
    lib_section: &str,
    path: impl AsRef<Path>,
) -> Result<()> {
    let netlist = render_verify_netlist(result, model_lib, lib_section)?;
    std::fs::write(path.as_ref(), netlist)?;
    log::info!("wrote verification netlist to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use arcstr::literal;

    use super::*;
    use crate::design::{DesignOutcome, DesignResult};

    fn result() -> DesignResult {
        DesignResult {
            model: literal!("nch_lv"),
            outcome: DesignOutcome::RequirementMet,
            length: 260e-9,
            width: 1.26e-6,
            vgs: 0.65,
            vds: 0.6,
            vbs: 0.0,
            vdd: 1.2,
            gmid: 10.2,
            gm_required: 62.83e-6,
            id_required: 6.16e-6,
            expected_gain: 25.0,
            expected_gain_db: 27.96,
            ft: 8e9,
            ft_margin: 80.0,
        }
    }

    #[test]
    fn netlist_names_the_sized_device() {
        let netlist =
            render_verify_netlist(&result(), "/pdk/models/corner.lib", "mos_tt").unwrap();
        assert!(netlist.contains("x1 drain gate 0 bulk nch_lv"));
        assert!(netlist.contains(".param l_design = 2.600000e-7"));
        assert!(netlist.contains(".param w_design = 1.260000e-6"));
        assert!(netlist.contains(".lib '/pdk/models/corner.lib' mos_tt"));
        assert!(netlist.contains(".param vgs_op = 0.6500"));
    }
}
