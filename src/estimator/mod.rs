//! Domain Formula Estimator
//!
//! Closed-form soil and biomass carbon calculators plus the credit
//! heuristic used for immediate, deterministic estimates. Nothing here
//! touches the network or storage.

pub mod request;
pub mod soil;
pub mod biomass;
pub mod credits;

pub use request::{EstimationRequest, Irrigation, ProjectCategory};
pub use soil::{compute_soil_carbon, SoilCarbonResult, SoilInput};
pub use biomass::{compute_agb_carbon, AgbCarbonResult, AgbInput};
pub use credits::{estimate_carbon, Assumptions, CarbonEstimate};

/// Mass ratio converting elemental carbon to CO2 equivalent.
pub const CO2_PER_C: f64 = 44.0 / 12.0;

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
