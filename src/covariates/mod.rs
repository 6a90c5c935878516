//! External Covariate Gatherer
//!
//! Enriches a coordinate with climate, solar and soil signals from three
//! independent remote sources. Lookups run concurrently, each under its own
//! timeout, and any lookup that fails simply leaves its fields absent.

pub mod sources;

pub use sources::{NasaPowerSolar, OpenMeteoClimate, SoilGridsCarbon};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Covariates for one location. Any subset may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CovariateBundle {
    /// Mean daily temperature over the window, °C.
    pub avg_temp_c: Option<f64>,
    /// Precipitation summed over the window, mm.
    pub total_precip_mm: Option<f64>,
    /// Mean daily irradiance, kWh/m²/day.
    pub solar_kwh_m2_day: Option<f64>,
    /// Topsoil organic carbon, g/kg.
    pub soil_organic_carbon: Option<f64>,
}

impl CovariateBundle {
    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }

    pub fn present_count(&self) -> usize {
        [
            self.avg_temp_c,
            self.total_precip_mm,
            self.solar_kwh_m2_day,
            self.soil_organic_carbon,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Inclusive range of calendar days a series is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// The `days` days ending on `end`.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - ChronoDuration::days(span),
            end,
        }
    }
}

/// Temperature/precipitation summary of a daily series.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClimateSummary {
    pub avg_temp_c: Option<f64>,
    pub total_precip_mm: Option<f64>,
}

#[async_trait]
pub trait ClimateSource: Send + Sync {
    async fn fetch_climate(&self, point: Coordinates, window: DateWindow) -> Result<ClimateSummary>;
}

#[async_trait]
pub trait SolarSource: Send + Sync {
    /// Mean daily irradiance over the window.
    async fn fetch_solar(&self, point: Coordinates, window: DateWindow) -> Result<f64>;
}

#[async_trait]
pub trait SoilCarbonSource: Send + Sync {
    async fn fetch_soil_carbon(&self, point: Coordinates) -> Result<f64>;
}

pub struct CovariateGatherer {
    climate: Arc<dyn ClimateSource>,
    solar: Arc<dyn SolarSource>,
    soil: Arc<dyn SoilCarbonSource>,
    timeout: Duration,
    window_days: u32,
}

impl CovariateGatherer {
    pub fn new(
        climate: Arc<dyn ClimateSource>,
        solar: Arc<dyn SolarSource>,
        soil: Arc<dyn SoilCarbonSource>,
    ) -> Self {
        Self {
            climate,
            solar,
            soil,
            timeout: DEFAULT_FETCH_TIMEOUT,
            window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    /// Gatherer backed by the public Open-Meteo, NASA POWER and SoilGrids APIs.
    pub fn http(client: reqwest::Client) -> Self {
        Self::new(
            Arc::new(OpenMeteoClimate::new(client.clone())),
            Arc::new(NasaPowerSolar::new(client.clone())),
            Arc::new(SoilGridsCarbon::new(client)),
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_window_days(mut self, days: u32) -> Self {
        self.window_days = days.max(1);
        self
    }

    /// Returns immediately with an empty bundle unless both coordinates are present.
    pub async fn gather(&self, latitude: Option<f64>, longitude: Option<f64>) -> CovariateBundle {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            debug!("No coordinates supplied, skipping covariate lookups");
            return CovariateBundle::default();
        };
        let point = Coordinates { latitude, longitude };
        let window = DateWindow::trailing(Utc::now().date_naive(), self.window_days);

        let (climate, solar, soil) = tokio::join!(
            settle("climate", self.timeout, self.climate.fetch_climate(point, window)),
            settle("solar", self.timeout, self.solar.fetch_solar(point, window)),
            settle("soil_carbon", self.timeout, self.soil.fetch_soil_carbon(point)),
        );

        let climate = climate.unwrap_or_default();
        let bundle = CovariateBundle {
            avg_temp_c: climate.avg_temp_c.filter(|v| v.is_finite()),
            total_precip_mm: climate.total_precip_mm.filter(|v| v.is_finite()),
            solar_kwh_m2_day: solar.filter(|v| v.is_finite()),
            soil_organic_carbon: soil.filter(|v| v.is_finite()),
        };
        info!(
            latitude,
            longitude,
            present = bundle.present_count(),
            "Covariates gathered"
        );
        bundle
    }
}

impl Default for CovariateGatherer {
    fn default() -> Self {
        Self::new(
            Arc::new(OpenMeteoClimate::default()),
            Arc::new(NasaPowerSolar::default()),
            Arc::new(SoilGridsCarbon::default()),
        )
    }
}

/// Awaits one lookup under `limit`. Timeouts drop (and so abort) the in-flight request.
async fn settle<T>(
    source: &'static str,
    limit: Duration,
    lookup: impl Future<Output = Result<T>>,
) -> Option<T> {
    match tokio::time::timeout(limit, lookup).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(source, error = %e, "Covariate lookup failed, treating as unavailable");
            None
        }
        Err(_) => {
            warn!(source, timeout_ms = limit.as_millis() as u64, "Covariate lookup timed out");
            None
        }
    }
}
