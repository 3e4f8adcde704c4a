use health_analytics::cleaning::{clean_activity, clean_patients};
use health_analytics::config::AppConfig;
use health_analytics::error::AnalyticsError;
use health_analytics::generator::{generate_activity, generate_patients, seeded_rng, write_csv, DEFAULT_SEED};
use health_analytics::ingestion::{DataLoader, SourceMode};
use health_analytics::pipeline::load_clean_datasets;
use health_analytics::store::LocalStore;
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;

fn config_for(dir: &Path) -> AppConfig {
    let mut values = HashMap::new();
    values.insert(
        "DATASET1_PATH".to_string(),
        dir.join("health_dataset_1.csv").display().to_string(),
    );
    values.insert(
        "DATASET2_PATH".to_string(),
        dir.join("health_dataset_2.csv").display().to_string(),
    );
    values.insert(
        "EXCEL_FILE_PATH".to_string(),
        dir.join("missing.xlsm").display().to_string(),
    );
    values.insert(
        "DATABASE_PATH".to_string(),
        dir.join("store").join("healthcare.db").display().to_string(),
    );
    AppConfig::from_map(&values).unwrap()
}

#[tokio::test]
async fn test_generated_csv_round_trip_into_store() {
    let dir = TempDir::new().unwrap();
    let mut rng = seeded_rng(DEFAULT_SEED);
    let patients = generate_patients(120, &mut rng).unwrap();
    let ids: Vec<String> = patients.iter().map(|p| p.patient_number.clone()).collect();
    let activity = generate_activity(&ids, 1500, &mut rng).unwrap();
    write_csv(&dir.path().join("health_dataset_1.csv"), &patients).unwrap();
    write_csv(&dir.path().join("health_dataset_2.csv"), &activity).unwrap();

    let config = config_for(dir.path());
    let (raw_patients, raw_activity) = DataLoader::new(&config, SourceMode::Files).load().await.unwrap();
    assert_eq!(raw_patients.len(), 120);
    assert_eq!(raw_activity.len(), 1500);

    let cleaned_patients = clean_patients(&raw_patients).unwrap();
    let cleaned_activity = clean_activity(&raw_activity).unwrap();
    assert_eq!(cleaned_patients[0].patient_number, "P00001");

    let mut store = LocalStore::open(&config.paths.database_path).unwrap();
    store.materialize(&cleaned_patients, &cleaned_activity).unwrap();

    let count = store.execute("SELECT COUNT(*) FROM health_dataset_1").unwrap();
    assert_eq!(count.rows[0][0], serde_json::json!(120));
    let count = store.execute("SELECT COUNT(*) FROM health_dataset_2").unwrap();
    assert_eq!(count.rows[0][0], serde_json::json!(1500));

    let violations = store
        .execute("SELECT COUNT(*) FROM health_dataset_1 WHERE Sex = 0 AND Pregnancy = 1")
        .unwrap();
    assert_eq!(violations.rows[0][0], serde_json::json!(0));
}

#[tokio::test]
async fn test_missing_activity_file_yields_empty_table() {
    let dir = TempDir::new().unwrap();
    let patients = generate_patients(10, &mut seeded_rng(3)).unwrap();
    write_csv(&dir.path().join("health_dataset_1.csv"), &patients).unwrap();

    let config = config_for(dir.path());
    let (patients, activity) = load_clean_datasets(&config, SourceMode::Files).await.unwrap();
    assert_eq!(patients.len(), 10);
    assert!(activity.is_empty());
}

#[tokio::test]
async fn test_no_source_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = config_for(dir.path());

    let err = DataLoader::new(&config, SourceMode::Auto).load().await.unwrap_err();
    assert!(matches!(err, AnalyticsError::SourceUnavailable(_)));
    assert_eq!(
        err.to_string(),
        "No data source found. Please configure SQL connection in .env file or provide data files."
    );
}
