//! Above-ground biomass (AGB) carbon.

use serde::{Deserialize, Serialize};

use super::{round3, CO2_PER_C};

/// IPCC default carbon fraction of dry biomass.
pub const CARBON_FRACTION: f64 = 0.47;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AgbInput {
    /// A measured AGB value in t/ha.
    Direct { agb_t_ha: f64 },
    /// Allometric estimate from tree measurements.
    Allometric {
        dbh_cm: f64,
        /// g/cm³
        wood_density: f64,
        #[serde(default)]
        height_m: Option<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgbCarbonResult {
    pub agb_t_ha: f64,
    pub carbon_t_ha: f64,
    pub co2e_t_ha: f64,
}

/// `0.0673 × (ρ·D²·H)^0.976`; height defaults to 1 when unknown.
pub fn allometric_agb(dbh_cm: f64, wood_density: f64, height_m: Option<f64>) -> f64 {
    let base = wood_density * dbh_cm * dbh_cm * height_m.unwrap_or(1.0);
    0.0673 * base.max(0.0).powf(0.976)
}

pub fn compute_agb_carbon(input: &AgbInput) -> AgbCarbonResult {
    let agb = match *input {
        AgbInput::Direct { agb_t_ha } => agb_t_ha,
        AgbInput::Allometric { dbh_cm, wood_density, height_m } => {
            allometric_agb(dbh_cm, wood_density, height_m)
        }
    };
    let carbon = agb * CARBON_FRACTION;

    AgbCarbonResult {
        agb_t_ha: round3(agb),
        carbon_t_ha: round3(carbon),
        co2e_t_ha: round3(carbon * CO2_PER_C),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_agb() {
        let r = compute_agb_carbon(&AgbInput::Direct { agb_t_ha: 100.0 });
        assert_eq!(r.agb_t_ha, 100.0);
        assert!((r.carbon_t_ha - 47.0).abs() < 1e-9);
        assert!((r.co2e_t_ha - 172.333).abs() < 1e-9);
    }

    #[test]
    fn test_carbon_fraction_holds() {
        for agb in [0.0, 3.3, 12.0, 250.5] {
            let r = compute_agb_carbon(&AgbInput::Direct { agb_t_ha: agb });
            assert!((r.carbon_t_ha - agb * 0.47).abs() < 1e-3);
        }
    }

    #[test]
    fn test_allometric_height_defaults_to_one() {
        let with_unit_height = allometric_agb(25.0, 0.6, Some(1.0));
        let without_height = allometric_agb(25.0, 0.6, None);
        assert_eq!(with_unit_height, without_height);
        let expected = 0.0673 * (0.6f64 * 625.0).powf(0.976);
        assert!((without_height - expected).abs() < 1e-12);
    }

    #[test]
    fn test_allometric_negative_base_clamped() {
        assert_eq!(allometric_agb(10.0, -0.5, Some(4.0)), 0.0);
    }

    #[test]
    fn test_untagged_deserialization() {
        let direct: AgbInput = serde_json::from_str(r#"{"agb_t_ha": 12.5}"#).unwrap();
        assert_eq!(direct, AgbInput::Direct { agb_t_ha: 12.5 });
        let allo: AgbInput =
            serde_json::from_str(r#"{"dbh_cm": 30.0, "wood_density": 0.55, "height_m": 18.0}"#).unwrap();
        assert!(matches!(allo, AgbInput::Allometric { .. }));
    }
}
