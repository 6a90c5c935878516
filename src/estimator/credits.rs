//! Multiplicative credit-per-hectare heuristic.

use serde::{Deserialize, Serialize};

use super::request::EstimationRequest;

/// Reference biomass (t/ha) at which the biomass factor is neutral.
pub const REFERENCE_BIOMASS_T_HA: f64 = 12.0;
/// USD per credit.
pub const CREDIT_PRICE_USD: f64 = 15.0;

const PH_LOW: f64 = 6.2;
const PH_HIGH: f64 = 7.2;
const PH_PENALTY: f64 = 0.9;

/// Every factor that went into an estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assumptions {
    pub baseline_credits_per_ha: f64,
    pub baseline_overridden: bool,
    pub ndvi_factor: f64,
    pub biomass_factor: f64,
    pub irrigation_factor: f64,
    pub ph_penalty: f64,
    pub years: u32,
    pub price_per_credit_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CarbonEstimate {
    pub area_ha: f64,
    pub credits_per_year: f64,
    pub total_credits: f64,
    pub estimated_value_usd: f64,
    pub assumptions: Assumptions,
}

/// Absent NDVI leaves the estimate unadjusted.
pub fn ndvi_factor(ndvi: Option<f64>) -> f64 {
    ndvi.map_or(1.0, |v| 0.7 + v * 0.5)
}

pub fn biomass_factor(biomass_t_ha: Option<f64>) -> f64 {
    biomass_t_ha.map_or(1.0, |b| {
        (1.0 + (b - REFERENCE_BIOMASS_T_HA) * 0.025).clamp(0.6, 1.3)
    })
}

pub fn ph_penalty(ph: Option<f64>) -> f64 {
    match ph {
        Some(ph) if !(PH_LOW..=PH_HIGH).contains(&ph) => PH_PENALTY,
        _ => 1.0,
    }
}

/// Deterministic credit estimate. Callers are expected to have validated the request.
pub fn estimate_carbon(request: &EstimationRequest) -> CarbonEstimate {
    let baseline = request
        .baseline_override
        .unwrap_or_else(|| request.category.baseline_credits_per_ha());
    let ndvi_factor = ndvi_factor(request.ndvi);
    let biomass_factor = biomass_factor(request.biomass_t_ha);
    let irrigation_factor = request.irrigation.map_or(1.0, |i| i.multiplier());
    let ph_penalty = ph_penalty(request.soil_ph);
    let years = request.years.unwrap_or(1).max(1);

    let credits_per_year =
        request.area_ha * baseline * ndvi_factor * biomass_factor * irrigation_factor * ph_penalty;
    let total_credits = credits_per_year * f64::from(years);

    CarbonEstimate {
        area_ha: request.area_ha,
        credits_per_year,
        total_credits,
        estimated_value_usd: total_credits * CREDIT_PRICE_USD,
        assumptions: Assumptions {
            baseline_credits_per_ha: baseline,
            baseline_overridden: request.baseline_override.is_some(),
            ndvi_factor,
            biomass_factor,
            irrigation_factor,
            ph_penalty,
            years,
            price_per_credit_usd: CREDIT_PRICE_USD,
        },
    }
}
