use anemia_ensemble::config::LoggingConfig;
use anemia_ensemble::{AppError, Predictor, Settings};
use tracing::info;

fn init_logging(config: &LoggingConfig) -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_max_level(config.max_level()?)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = Settings::load()?;
    init_logging(&settings.logging)?;

    let predictor = Predictor::new(&settings);
    let model = predictor.warm_up().await?;
    info!(
        "Predictor ready: {:?}, artifact {:?}, validation accuracy {:?}",
        predictor.manager().state(),
        predictor.manager().artifact_path(),
        model.metadata().validation_accuracy
    );
    Ok(())
}
