use lazy_static::lazy_static;
use tera::Tera;

pub mod cli;
pub mod config;
pub mod derived;
pub mod design;
pub mod error;
pub mod io;
pub mod netlist;
pub mod oracle;
pub mod paths;
pub mod plot;
pub mod sweep;
pub mod table;

pub use error::{Gmid22Error, Result};

pub const BUILD_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/build");

lazy_static! {
    pub static ref TEMPLATES: Tera =
        match Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/*")) {
            Ok(t) => t,
            Err(e) => panic!("Error parsing templates: {e}"),
        };
}

#[cfg(test)]
pub mod tests {
    use crate::oracle::{OracleError, OracleInput, RawSample, SimulationOracle};

    /// Closure-backed oracle for synthetic table fixtures.
    pub(crate) struct FnOracle<F>(pub F);

    impl<F> SimulationOracle for FnOracle<F>
    where
        F: Fn(&OracleInput) -> std::result::Result<RawSample, OracleError> + Sync,
    {
        fn evaluate(&self, input: &OracleInput) -> std::result::Result<RawSample, OracleError> {
            (self.0)(input)
        }
    }
}
