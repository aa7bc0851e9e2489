//! Offline CLI: observation store -> training frame -> CSV + feature-column
//! artifact for the external training step.

use std::error::Error;
use std::path::PathBuf;

use tracing::info;
use tricast::{
    assemble_training_frame, init_logging, label_column, load_observations, log_app_start,
    logging_config_from_env, open_store, save_feature_columns, schema_for_columns, Coin,
};

const FEATURES_FILE: &str = "features.csv";
const LABELS_FILE: &str = "labels.csv";

fn main() -> Result<(), Box<dyn Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("export_training_frame", &logging_cfg);

    let store_path = PathBuf::from(
        std::env::var("TRICAST_STORE_PATH").unwrap_or_else(|_| "observations.sqlite".to_string()),
    );
    let out_dir = PathBuf::from(
        std::env::var("TRICAST_OUT_DIR").unwrap_or_else(|_| "models".to_string()),
    );
    let horizon: usize = std::env::var("TRICAST_HORIZON")
        .unwrap_or_else(|_| "3".to_string())
        .parse()?;

    let conn = open_store(&store_path)?;
    let (_timestamps, raw) = load_observations(&conn)?;
    let training = assemble_training_frame(&raw, horizon)?;

    std::fs::create_dir_all(&out_dir)?;

    let mut features = csv::Writer::from_path(out_dir.join(FEATURES_FILE))?;
    let mut header = vec!["row_index".to_string()];
    header.extend(training.feature_columns.iter().cloned());
    features.write_record(&header)?;
    for (pos, row_index) in training.row_indices.iter().enumerate() {
        let mut record = vec![row_index.to_string()];
        let row = training.x.row(pos).expect("x rows align with row_indices");
        record.extend(row.iter().map(|v| v.to_string()));
        features.write_record(&record)?;
    }
    features.flush()?;

    let mut labels = csv::Writer::from_path(out_dir.join(LABELS_FILE))?;
    let mut header = vec!["row_index".to_string()];
    header.extend(Coin::ALL.iter().map(|coin| label_column(*coin)));
    labels.write_record(&header)?;
    for (pos, row_index) in training.row_indices.iter().enumerate() {
        let mut record = vec![row_index.to_string()];
        for coin in Coin::ALL {
            record.push(training.y[&coin][pos].to_string());
        }
        labels.write_record(&record)?;
    }
    labels.flush()?;

    let schema = schema_for_columns(training.feature_columns.clone());
    save_feature_columns(&out_dir, &schema)?;

    info!(
        component = "export_training_frame",
        event = "export.finished",
        rows = training.row_indices.len(),
        feature_count = training.feature_columns.len(),
        horizon,
        out_dir = %out_dir.display()
    );

    Ok(())
}
