//! Project parameters supplied by a caller for estimation or ingestion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, PipelineResult};

/// Kind of carbon project a plot is enrolled in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Agroforestry,
    Rice,
    Soil,
    Biomass,
}

impl ProjectCategory {
    /// Fixed one-hot ordering used by the feature builder.
    pub const ALL: [ProjectCategory; 4] = [
        ProjectCategory::Agroforestry,
        ProjectCategory::Rice,
        ProjectCategory::Soil,
        ProjectCategory::Biomass,
    ];

    /// Baseline credits per hectare per year before adjustments.
    pub fn baseline_credits_per_ha(self) -> f64 {
        match self {
            ProjectCategory::Agroforestry => 3.2,
            ProjectCategory::Rice => 1.5,
            ProjectCategory::Soil => 1.0,
            ProjectCategory::Biomass => 2.5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectCategory::Agroforestry => "agroforestry",
            ProjectCategory::Rice => "rice",
            ProjectCategory::Soil => "soil",
            ProjectCategory::Biomass => "biomass",
        }
    }
}

impl fmt::Display for ProjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Irrigation method of the plot.
///
/// Unrecognised strings deserialize to `Other`, which carries no
/// multiplier and an all-zero one-hot block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Irrigation {
    Drip,
    Sprinkler,
    Flood,
    Rainfed,
    #[serde(other)]
    Other,
}

impl Irrigation {
    /// Fixed one-hot ordering used by the feature builder. `Other` has no slot.
    pub const SLOTS: [Irrigation; 4] = [
        Irrigation::Drip,
        Irrigation::Sprinkler,
        Irrigation::Flood,
        Irrigation::Rainfed,
    ];

    pub fn multiplier(self) -> f64 {
        match self {
            Irrigation::Drip => 1.1,
            Irrigation::Sprinkler => 1.05,
            Irrigation::Flood => 0.9,
            Irrigation::Rainfed | Irrigation::Other => 1.0,
        }
    }
}

/// Parameters describing a plot and its project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimationRequest {
    /// Plot area in hectares.
    pub area_ha: f64,
    pub category: ProjectCategory,
    #[serde(default)]
    pub ndvi: Option<f64>,
    /// Above-ground biomass in t/ha.
    #[serde(default)]
    pub biomass_t_ha: Option<f64>,
    #[serde(default)]
    pub irrigation: Option<Irrigation>,
    #[serde(default)]
    pub soil_ph: Option<f64>,
    /// Crediting period in whole years.
    #[serde(default)]
    pub years: Option<u32>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Replaces the category baseline (credits/ha/yr) when set.
    #[serde(default)]
    pub baseline_override: Option<f64>,
}

impl EstimationRequest {
    pub fn new(area_ha: f64, category: ProjectCategory) -> Self {
        Self {
            area_ha,
            category,
            ndvi: None,
            biomass_t_ha: None,
            irrigation: None,
            soil_ph: None,
            years: None,
            latitude: None,
            longitude: None,
            baseline_override: None,
        }
    }

    pub fn with_ndvi(mut self, ndvi: f64) -> Self {
        self.ndvi = Some(ndvi);
        self
    }

    pub fn with_biomass(mut self, biomass_t_ha: f64) -> Self {
        self.biomass_t_ha = Some(biomass_t_ha);
        self
    }

    pub fn with_irrigation(mut self, irrigation: Irrigation) -> Self {
        self.irrigation = Some(irrigation);
        self
    }

    pub fn with_soil_ph(mut self, ph: f64) -> Self {
        self.soil_ph = Some(ph);
        self
    }

    pub fn with_years(mut self, years: u32) -> Self {
        self.years = Some(years);
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_baseline(mut self, baseline: f64) -> Self {
        self.baseline_override = Some(baseline);
        self
    }

    /// Both coordinates, if the caller supplied them.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Rejects values that would otherwise flow silently into nonsensical estimates.
    pub fn validate(&self) -> PipelineResult<()> {
        if !self.area_ha.is_finite() || self.area_ha < 0.0 {
            return Err(PipelineError::invalid(format!(
                "area must be a finite, non-negative number of hectares (got {})",
                self.area_ha
            )));
        }
        if let Some(ndvi) = self.ndvi {
            if !(0.0..=1.0).contains(&ndvi) {
                return Err(PipelineError::invalid(format!(
                    "ndvi must lie in [0, 1] (got {})",
                    ndvi
                )));
            }
        }
        if let Some(biomass) = self.biomass_t_ha {
            if !biomass.is_finite() || biomass < 0.0 {
                return Err(PipelineError::invalid(format!(
                    "biomass must be finite and non-negative (got {})",
                    biomass
                )));
            }
        }
        if let Some(ph) = self.soil_ph {
            if !(0.0..=14.0).contains(&ph) {
                return Err(PipelineError::invalid(format!(
                    "soil pH must lie in [0, 14] (got {})",
                    ph
                )));
            }
        }
        if self.years == Some(0) {
            return Err(PipelineError::invalid("years must be at least 1"));
        }
        if let Some(lat) = self.latitude {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(PipelineError::invalid(format!(
                    "latitude must lie in [-90, 90] (got {})",
                    lat
                )));
            }
        }
        if let Some(lon) = self.longitude {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(PipelineError::invalid(format!(
                    "longitude must lie in [-180, 180] (got {})",
                    lon
                )));
            }
        }
        if let Some(baseline) = self.baseline_override {
            if !baseline.is_finite() || baseline <= 0.0 {
                return Err(PipelineError::invalid(format!(
                    "baseline override must be positive (got {})",
                    baseline
                )));
            }
        }
        Ok(())
    }
}
