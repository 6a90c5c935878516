//! Feature Builder
//!
//! Maps a request plus its covariates onto the fixed-length vector every
//! stored model is aligned to. Changing the slot order or count below
//! invalidates all trained models.

use crate::covariates::CovariateBundle;
use crate::estimator::{EstimationRequest, Irrigation, ProjectCategory};

pub const FEATURE_COUNT: usize = 17;

/// Slot names, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "area_ha",
    "ndvi",
    "biomass_t_ha",
    "soil_ph",
    "years",
    "category_agroforestry",
    "category_rice",
    "category_soil",
    "category_biomass",
    "irrigation_drip",
    "irrigation_sprinkler",
    "irrigation_flood",
    "irrigation_rainfed",
    "avg_temp_c",
    "total_precip_mm",
    "solar_kwh_m2_day",
    "soil_organic_carbon",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Values substituted for absent inputs.
pub mod defaults {
    pub const AREA_HA: f64 = 0.0;
    pub const NDVI: f64 = 0.7;
    pub const BIOMASS_T_HA: f64 = 12.0;
    pub const SOIL_PH: f64 = 6.8;
    pub const YEARS: u32 = 1;
    pub const AVG_TEMP_C: f64 = 24.0;
    pub const TOTAL_PRECIP_MM: f64 = 100.0;
    pub const SOLAR_KWH_M2_DAY: f64 = 5.0;
    pub const SOIL_ORGANIC_CARBON: f64 = 15.0;
}

pub fn build_features(request: &EstimationRequest, covariates: &CovariateBundle) -> FeatureVector {
    let mut v = [0.0; FEATURE_COUNT];

    v[0] = if request.area_ha.is_finite() { request.area_ha } else { defaults::AREA_HA };
    v[1] = request.ndvi.unwrap_or(defaults::NDVI).clamp(0.0, 1.0);
    v[2] = request.biomass_t_ha.unwrap_or(defaults::BIOMASS_T_HA);
    v[3] = request.soil_ph.unwrap_or(defaults::SOIL_PH);
    v[4] = f64::from(request.years.unwrap_or(defaults::YEARS).max(1));

    if let Some(slot) = ProjectCategory::ALL.iter().position(|c| *c == request.category) {
        v[5 + slot] = 1.0;
    }
    // `Other` has no slot and leaves the block zeroed.
    if let Some(slot) = request
        .irrigation
        .and_then(|i| Irrigation::SLOTS.iter().position(|s| *s == i))
    {
        v[9 + slot] = 1.0;
    }

    v[13] = covariates.avg_temp_c.unwrap_or(defaults::AVG_TEMP_C);
    v[14] = covariates.total_precip_mm.unwrap_or(defaults::TOTAL_PRECIP_MM);
    v[15] = covariates.solar_kwh_m2_day.unwrap_or(defaults::SOLAR_KWH_M2_DAY);
    v[16] = covariates.soil_organic_carbon.unwrap_or(defaults::SOIL_ORGANIC_CARBON);

    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_is_fixed() {
        let sparse = build_features(
            &EstimationRequest::new(1.2, ProjectCategory::Rice),
            &CovariateBundle::default(),
        );
        let full = build_features(
            &EstimationRequest::new(3.0, ProjectCategory::Agroforestry)
                .with_ndvi(0.6)
                .with_irrigation(Irrigation::Flood),
            &CovariateBundle {
                avg_temp_c: Some(28.0),
                total_precip_mm: Some(210.0),
                solar_kwh_m2_day: Some(5.8),
                soil_organic_carbon: Some(11.0),
            },
        );
        assert_eq!(sparse.len(), full.len());
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_defaults_fill_absent_inputs() {
        let v = build_features(
            &EstimationRequest::new(1.2, ProjectCategory::Rice),
            &CovariateBundle::default(),
        );
        assert_eq!(
            v,
            [
                1.2, 0.7, 12.0, 6.8, 1.0, // scalars
                0.0, 1.0, 0.0, 0.0, // category
                0.0, 0.0, 0.0, 0.0, // irrigation
                24.0, 100.0, 5.0, 15.0, // covariates
            ]
        );
    }

    #[test]
    fn test_one_hot_blocks() {
        let v = build_features(
            &EstimationRequest::new(2.0, ProjectCategory::Biomass).with_irrigation(Irrigation::Sprinkler),
            &CovariateBundle::default(),
        );
        assert_eq!(&v[5..9], &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(&v[9..13], &[0.0, 1.0, 0.0, 0.0]);

        let other = build_features(
            &EstimationRequest::new(2.0, ProjectCategory::Soil).with_irrigation(Irrigation::Other),
            &CovariateBundle::default(),
        );
        assert!(other[9..13].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_ndvi_clamped_and_years_floored() {
        let mut request = EstimationRequest::new(1.0, ProjectCategory::Soil).with_ndvi(1.7);
        request.years = Some(0);
        let v = build_features(&request, &CovariateBundle::default());
        assert_eq!(v[1], 1.0);
        assert_eq!(v[4], 1.0);
    }
}
