//! The solver's configuration document (spec.md sec 6), independent of
//! how `dg_cli` loads it from disk.

use crate::error::{Result, SolverError};
use crate::flux::FluxType;
use crate::rk::LimiterKind;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub polynomial_order: usize,
    pub cfl: f64,
    pub final_time: f64,
    pub max_iterations: u64,
    pub flux_type: String,
    pub init_type: String,
    pub minf: f64,
    pub gamma: f64,
    pub alpha: f64,
    pub limiter: String,
    pub kappa: f64,
    pub local_time_stepping: bool,
    #[serde(default)]
    pub bcs: HashMap<String, HashMap<String, HashMap<String, f64>>>,
}

impl Config {
    pub fn flux_kind(&self) -> Result<FluxType> {
        match self.flux_type.as_str() {
            "average" => Ok(FluxType::Average),
            "lax" => Ok(FluxType::LaxFriedrichs),
            "roe" => Ok(FluxType::Roe),
            other => Err(SolverError::configuration(format!("unknown FluxType '{other}'"))),
        }
    }

    pub fn limiter_kind(&self) -> Result<LimiterKind> {
        match self.limiter.as_str() {
            "none" => Ok(LimiterKind::None),
            "barth_jespersen" => Ok(LimiterKind::BarthJespersen),
            other => Err(SolverError::configuration(format!("unknown Limiter '{other}'"))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.polynomial_order < 1 {
            return Err(SolverError::configuration("PolynomialOrder must be >= 1"));
        }
        if self.cfl <= 0.0 {
            return Err(SolverError::configuration("CFL must be positive"));
        }
        if !self.local_time_stepping && self.final_time <= 0.0 {
            return Err(SolverError::configuration("FinalTime must be positive in global-dt mode"));
        }
        self.flux_kind()?;
        self.limiter_kind()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            polynomial_order: 3,
            cfl: 0.5,
            final_time: 1.0,
            max_iterations: 1000,
            flux_type: "roe".to_string(),
            init_type: "freestream".to_string(),
            minf: 0.3,
            gamma: 1.4,
            alpha: 0.0,
            limiter: "barth_jespersen".to_string(),
            kappa: 4.0,
            local_time_stepping: false,
            bcs: HashMap::new(),
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn unknown_flux_type_is_rejected() {
        let mut cfg = base_config();
        cfg.flux_type = "upwind".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_positive_cfl_is_rejected() {
        let mut cfg = base_config();
        cfg.cfl = 0.0;
        assert!(cfg.validate().is_err());
    }
}
