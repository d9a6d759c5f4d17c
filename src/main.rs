//! Entry point: run one training pass from the hardcoded config path.

use std::error::Error;
use std::path::Path;

use tabtrain::config::ModelConfig;
use tabtrain::controller::TrainingController;
use tabtrain::logging;

const CONFIG_PATH: &str = "tabtrain.toml";

fn main() {
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    if let Err(err) = run() {
        eprintln!("{err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = ModelConfig::load(Path::new(CONFIG_PATH))?;
    let controller = TrainingController::new(config);
    let report = controller.train_model()?;

    println!(
        "Evaluation metric ({}): {:.4}",
        report.evaluator.name(),
        report.evaluation_metric
    );
    println!(
        "Cross-validated {} over {} folds: {:.4}",
        report.evaluator.name(),
        report.fold_scores.len(),
        report.cv_score
    );
    println!("Model saved to: {}", report.model_path.display());
    Ok(())
}
