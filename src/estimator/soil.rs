//! Soil organic carbon stock.

use serde::{Deserialize, Serialize};

use super::{round3, CO2_PER_C};

/// A soil sample description. SOC may be given as percent-by-weight or g/kg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "soc_unit", rename_all = "snake_case")]
pub enum SoilInput {
    Percent {
        soc_percent: f64,
        /// g/cm³
        bulk_density: f64,
        depth_cm: f64,
        #[serde(default)]
        rock_fragment_pct: Option<f64>,
    },
    GramsPerKg {
        soc_g_kg: f64,
        bulk_density: f64,
        depth_cm: f64,
        #[serde(default)]
        rock_fragment_pct: Option<f64>,
    },
}

/// Stock result plus the intermediate values used to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilCarbonResult {
    pub carbon_t_ha: f64,
    pub co2e_t_ha: f64,
    pub rock_fraction: f64,
    pub bulk_density: f64,
    pub depth_m: f64,
}

/// Soil carbon stock in t/ha.
///
/// Inputs are not range-checked; garbage in yields garbage out.
pub fn compute_soil_carbon(input: &SoilInput) -> SoilCarbonResult {
    let (bulk_density, depth_cm, rock_pct) = match *input {
        SoilInput::Percent { bulk_density, depth_cm, rock_fragment_pct, .. }
        | SoilInput::GramsPerKg { bulk_density, depth_cm, rock_fragment_pct, .. } => {
            (bulk_density, depth_cm, rock_fragment_pct.unwrap_or(0.0))
        }
    };
    let rock_fraction = rock_pct.clamp(0.0, 100.0) / 100.0;
    let depth_m = depth_cm / 100.0;

    let carbon = match *input {
        SoilInput::Percent { soc_percent, .. } => {
            (soc_percent / 100.0) * bulk_density * depth_cm * (1.0 - rock_fraction) * 10.0
        }
        SoilInput::GramsPerKg { soc_g_kg, .. } => {
            soc_g_kg * bulk_density * depth_m * 10.0 * (1.0 - rock_fraction)
        }
    };

    SoilCarbonResult {
        carbon_t_ha: round3(carbon),
        co2e_t_ha: round3(carbon * CO2_PER_C),
        rock_fraction,
        bulk_density,
        depth_m,
    }
}
