//! End-to-end scenarios over the pipeline with in-process sources and storage.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agro_carbon::covariates::{
    ClimateSource, ClimateSummary, Coordinates, DateWindow, SoilCarbonSource, SolarSource,
};
use agro_carbon::{
    CarbonPipeline, CovariateGatherer, EstimationRequest, ExampleInput, InMemoryModelRepository,
    Irrigation, ModelRepository, PipelineError, ProjectCategory, SqliteModelRepository,
    FEATURE_COUNT,
};

#[derive(Default)]
struct CountingClimate {
    calls: AtomicUsize,
}

#[async_trait]
impl ClimateSource for CountingClimate {
    async fn fetch_climate(&self, _: Coordinates, _: DateWindow) -> Result<ClimateSummary> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ClimateSummary {
            avg_temp_c: Some(26.0),
            total_precip_mm: Some(140.0),
        })
    }
}

struct FixedSolar;

#[async_trait]
impl SolarSource for FixedSolar {
    async fn fetch_solar(&self, _: Coordinates, _: DateWindow) -> Result<f64> {
        Ok(5.2)
    }
}

struct DownSoil;

#[async_trait]
impl SoilCarbonSource for DownSoil {
    async fn fetch_soil_carbon(&self, _: Coordinates) -> Result<f64> {
        anyhow::bail!("connection refused")
    }
}

fn offline_gatherer() -> (CovariateGatherer, Arc<CountingClimate>) {
    let climate = Arc::new(CountingClimate::default());
    let gatherer = CovariateGatherer::new(climate.clone(), Arc::new(FixedSolar), Arc::new(DownSoil));
    (gatherer, climate)
}

fn plot(i: usize) -> EstimationRequest {
    let category = ProjectCategory::ALL[i % ProjectCategory::ALL.len()];
    EstimationRequest::new(1.0 + i as f64, category)
        .with_ndvi(0.4 + (i % 5) as f64 * 0.1)
        .with_biomass(8.0 + (i % 7) as f64)
        .with_irrigation(Irrigation::Drip)
}

#[tokio::test]
async fn test_estimate_needs_no_sources() {
    let (gatherer, climate) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer);

    let request = EstimationRequest::new(2.0, ProjectCategory::Agroforestry)
        .with_ndvi(0.8)
        .with_biomass(12.0)
        .with_irrigation(Irrigation::Drip)
        .with_location(13.7, 100.5);
    let estimate = pipeline.estimate(&request).unwrap();

    assert!((estimate.credits_per_year - 7.744).abs() < 1e-9);
    assert_eq!(climate.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_estimate_rejects_invalid_input() {
    let (gatherer, _) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer);

    let err = pipeline
        .estimate(&EstimationRequest::new(-1.0, ProjectCategory::Rice))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_train_refuses_small_corpus() {
    let (gatherer, _) = offline_gatherer();
    let repo = Arc::new(InMemoryModelRepository::new());
    let pipeline = CarbonPipeline::new(repo.clone(), gatherer);

    for i in 0..5 {
        pipeline
            .ingest_example(ExampleInput::Request(plot(i)), 2.0 + i as f64, json!({}))
            .await
            .unwrap();
    }

    match pipeline.train().await {
        Err(PipelineError::InsufficientData { count, required }) => {
            assert_eq!(count, 5);
            assert_eq!(required, 10);
        }
        other => panic!("expected InsufficientData, got {:?}", other),
    }
    assert!(repo.get_latest_model(pipeline.model_name()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_ingest_gathers_covariates_for_located_requests() {
    let (gatherer, climate) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer);

    let located = plot(1).with_location(-1.3, 36.8);
    let ack = pipeline
        .ingest_example(ExampleInput::Request(located), 4.2, json!({"plot": "A1"}))
        .await
        .unwrap();

    let covariates = ack.covariates.unwrap();
    assert_eq!(ack.example_count, 1);
    assert_eq!(covariates.avg_temp_c, Some(26.0));
    assert_eq!(covariates.solar_kwh_m2_day, Some(5.2));
    assert_eq!(covariates.soil_organic_carbon, None);
    assert_eq!(climate.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ingest_rejects_wrong_width_vector() {
    let (gatherer, _) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer);

    let err = pipeline
        .ingest_example(ExampleInput::Features(vec![1.0; 3]), 1.0, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::DimensionMismatch { expected: FEATURE_COUNT, actual: 3 }
    ));

    let err = pipeline
        .ingest_example(ExampleInput::Request(plot(0)), f64::NAN, json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
}

#[tokio::test]
async fn test_train_then_predict() {
    let (gatherer, _) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer);

    // Labels follow the formula estimate, so a linear fit has real signal.
    for i in 0..14 {
        let request = plot(i);
        let label = pipeline.estimate(&request).unwrap().credits_per_year;
        pipeline
            .ingest_example(ExampleInput::Request(request), label, json!({ "i": i }))
            .await
            .unwrap();
    }

    let report = pipeline.train().await.unwrap();
    assert_eq!(report.version, 1);
    assert_eq!(report.training_count, 14);
    assert_eq!(report.holdout_count, 0);
    assert!(report.rmse.is_finite());
    assert!(report.validation.is_none());

    let info = pipeline.model_info().await.unwrap().unwrap();
    assert_eq!(info.version, 1);
    assert_eq!(info.feature_names.len(), FEATURE_COUNT);

    let prediction = pipeline.predict(&plot(3)).await.unwrap();
    assert_eq!(prediction.model_version, 1);
    assert_eq!(prediction.features.len(), FEATURE_COUNT);
    assert!(prediction.predicted_credits_per_year.is_finite());

    let second = pipeline.train().await.unwrap();
    assert_eq!(second.version, 2);
}

#[tokio::test]
async fn test_predict_without_model() {
    let (gatherer, _) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer)
        .with_model_name("untrained");

    let err = pipeline.predict(&plot(0)).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoModel { ref name } if name == "untrained"));
    assert!(pipeline.model_info().await.unwrap().is_none());
}

#[tokio::test]
async fn test_holdout_reports_validation_metrics() {
    let (gatherer, _) = offline_gatherer();
    let pipeline = CarbonPipeline::new(Arc::new(InMemoryModelRepository::new()), gatherer)
        .with_holdout_fraction(0.25);

    for i in 0..16 {
        let request = plot(i);
        let label = pipeline.estimate(&request).unwrap().credits_per_year;
        pipeline
            .ingest_example(ExampleInput::Request(request), label, json!({}))
            .await
            .unwrap();
    }

    let report = pipeline.train().await.unwrap();
    assert_eq!(report.training_count, 12);
    assert_eq!(report.holdout_count, 4);
    assert!(report.validation.is_some());

    let info = pipeline.model_info().await.unwrap().unwrap();
    assert_eq!(info.training_count, 12);
    assert_eq!(info.metrics.holdout_count, 4);
}

#[tokio::test]
async fn test_concurrent_training_gets_distinct_versions() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(SqliteModelRepository::new(dir.path().join("carbon.db")).await.unwrap());
    let (gatherer, _) = offline_gatherer();
    let pipeline = Arc::new(
        CarbonPipeline::new(repo, gatherer).with_trainer_config(agro_carbon::TrainerConfig {
            epochs: 200,
            ..Default::default()
        }),
    );

    for i in 0..12 {
        let mut features = vec![0.0; FEATURE_COUNT];
        features[0] = i as f64;
        features[1] = 0.5;
        pipeline
            .ingest_example(ExampleInput::Features(features), 2.0 * i as f64 + 1.0, json!({}))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..3 {
        let p = pipeline.clone();
        handles.push(tokio::spawn(async move { p.train().await }));
    }

    let mut versions = Vec::new();
    for h in handles {
        versions.push(h.await.unwrap().unwrap().version);
    }
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3]);
}
