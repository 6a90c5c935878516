//! HTTP-backed covariate sources.
//!
//! - Open-Meteo historical archive (daily temperature and precipitation)
//! - NASA POWER daily point API (all-sky surface shortwave irradiance)
//! - ISRIC SoilGrids v2 (topsoil organic carbon)

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use super::{ClimateSource, ClimateSummary, Coordinates, DateWindow, SoilCarbonSource, SolarSource};

const USER_AGENT: &str = "agro_carbon/0.2.0";

fn default_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    debug!("Fetching covariates: {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send covariate request")?;

    let status = response.status();
    if !status.is_success() {
        bail!("covariate service returned {}", status);
    }

    response
        .json::<T>()
        .await
        .context("Failed to parse covariate payload")
}

// ──────────────────────────────────────────────────────────────────────────────
// CLIMATE
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    daily: OpenMeteoDaily,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoDaily {
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
}

impl OpenMeteoDaily {
    fn summarize(&self) -> Result<ClimateSummary> {
        let temps: Vec<f64> = self.temperature_2m_mean.iter().flatten().copied().collect();
        let precip: Vec<f64> = self.precipitation_sum.iter().flatten().copied().collect();

        let summary = ClimateSummary {
            avg_temp_c: mean(&temps),
            total_precip_mm: (!precip.is_empty()).then(|| precip.iter().sum()),
        };
        if summary.avg_temp_c.is_none() && summary.total_precip_mm.is_none() {
            bail!("climate series contained no usable daily values");
        }
        Ok(summary)
    }
}

pub struct OpenMeteoClimate {
    client: Client,
    pub base_url: String,
}

impl OpenMeteoClimate {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
        }
    }
}

impl Default for OpenMeteoClimate {
    fn default() -> Self {
        Self::new(default_client())
    }
}

#[async_trait]
impl ClimateSource for OpenMeteoClimate {
    async fn fetch_climate(&self, point: Coordinates, window: DateWindow) -> Result<ClimateSummary> {
        let url = format!(
            "{}?latitude={}&longitude={}&start_date={}&end_date={}&daily=temperature_2m_mean,precipitation_sum&timezone=UTC",
            self.base_url,
            point.latitude,
            point.longitude,
            window.start.format("%Y-%m-%d"),
            window.end.format("%Y-%m-%d"),
        );
        let payload: OpenMeteoResponse = get_json(&self.client, &url).await?;
        payload.daily.summarize()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// SOLAR
// ──────────────────────────────────────────────────────────────────────────────

const POWER_PARAMETER: &str = "ALLSKY_SFC_SW_DWN";
/// The RE community reports irradiance in kW-hr/m^2/day; AG would report MJ/m^2/day.
const POWER_COMMUNITY: &str = "RE";
const MJ_PER_KWH: f64 = 3.6;

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
    #[serde(default)]
    parameters: BTreeMap<String, PowerParameterInfo>,
}

#[derive(Debug, Deserialize)]
struct PowerParameterInfo {
    #[serde(default)]
    units: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: BTreeMap<String, BTreeMap<String, f64>>,
}

impl PowerResponse {
    /// Mean irradiance in kWh/m²/day. POWER marks missing days with -999.
    fn mean_irradiance(&self) -> Result<f64> {
        let series = self
            .properties
            .parameter
            .get(POWER_PARAMETER)
            .with_context(|| format!("payload has no {} series", POWER_PARAMETER))?;
        let valid: Vec<f64> = series
            .values()
            .copied()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .collect();
        let avg = mean(&valid).context("irradiance series contained only fill values")?;
        Ok(avg / self.kwh_divisor())
    }

    fn kwh_divisor(&self) -> f64 {
        let units = self
            .parameters
            .get(POWER_PARAMETER)
            .and_then(|p| p.units.as_deref())
            .unwrap_or_default();
        if units.to_ascii_uppercase().starts_with("MJ") {
            MJ_PER_KWH
        } else {
            1.0
        }
    }
}

pub struct NasaPowerSolar {
    client: Client,
    pub base_url: String,
}

impl NasaPowerSolar {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://power.larc.nasa.gov/api/temporal/daily/point".to_string(),
        }
    }
}

impl NasaPowerSolar {
    fn request_url(&self, point: Coordinates, window: DateWindow) -> String {
        format!(
            "{}?parameters={}&community={}&longitude={}&latitude={}&start={}&end={}&format=JSON",
            self.base_url,
            POWER_PARAMETER,
            POWER_COMMUNITY,
            point.longitude,
            point.latitude,
            window.start.format("%Y%m%d"),
            window.end.format("%Y%m%d"),
        )
    }
}

impl Default for NasaPowerSolar {
    fn default() -> Self {
        Self::new(default_client())
    }
}

#[async_trait]
impl SolarSource for NasaPowerSolar {
    async fn fetch_solar(&self, point: Coordinates, window: DateWindow) -> Result<f64> {
        let url = self.request_url(point, window);
        let payload: PowerResponse = get_json(&self.client, &url).await?;
        payload.mean_irradiance()
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// SOIL ORGANIC CARBON
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SoilGridsResponse {
    properties: SoilGridsProperties,
}

#[derive(Debug, Deserialize)]
struct SoilGridsProperties {
    layers: Vec<SoilGridsLayer>,
}

#[derive(Debug, Deserialize)]
struct SoilGridsLayer {
    name: String,
    #[serde(default)]
    unit_measure: Option<SoilGridsUnit>,
    depths: Vec<SoilGridsDepth>,
}

#[derive(Debug, Deserialize)]
struct SoilGridsUnit {
    d_factor: f64,
}

#[derive(Debug, Deserialize)]
struct SoilGridsDepth {
    values: SoilGridsValues,
}

#[derive(Debug, Deserialize)]
struct SoilGridsValues {
    mean: Option<f64>,
}

impl SoilGridsResponse {
    /// SOC in g/kg. SoilGrids reports dg/kg scaled by `d_factor`.
    fn soc_g_kg(&self) -> Result<f64> {
        let layer = self
            .properties
            .layers
            .iter()
            .find(|l| l.name == "soc")
            .context("payload has no soc layer")?;
        let raw = layer
            .depths
            .iter()
            .find_map(|d| d.values.mean)
            .context("soc layer has no mean value")?;
        let d_factor = layer
            .unit_measure
            .as_ref()
            .map(|u| u.d_factor)
            .filter(|f| *f > 0.0)
            .unwrap_or(10.0);
        Ok(raw / d_factor)
    }
}

pub struct SoilGridsCarbon {
    client: Client,
    pub base_url: String,
}

impl SoilGridsCarbon {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://rest.isric.org/soilgrids/v2.0/properties/query".to_string(),
        }
    }
}

impl Default for SoilGridsCarbon {
    fn default() -> Self {
        Self::new(default_client())
    }
}

#[async_trait]
impl SoilCarbonSource for SoilGridsCarbon {
    async fn fetch_soil_carbon(&self, point: Coordinates) -> Result<f64> {
        let url = format!(
            "{}?lon={}&lat={}&property=soc&depth=0-5cm&value=mean",
            self.base_url, point.longitude, point.latitude,
        );
        let payload: SoilGridsResponse = get_json(&self.client, &url).await?;
        payload.soc_g_kg()
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
