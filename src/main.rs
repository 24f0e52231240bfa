use std::env;
use std::thread;
use std::time::Duration;

use log::info;

use ferrite_digits::data::size_label;
use ferrite_digits::{
    image_bytes_to_tensor, BatchPreparationStatus, Config, CpuTrainer, Error, Orchestrator, Result,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load_json(&path)?,
        None => Config::default(),
    };
    let image_path = args.next();

    let mut orch = Orchestrator::new(CpuTrainer::new(), config)?;

    let files = orch.data_files();
    info!(
        "training data '{}' ({}), prediction data '{}' ({})",
        files.train.display(),
        size_label(files.train_size_bytes()),
        files.test.display(),
        size_label(files.test_size_bytes())
    );

    orch.start_training_batch();
    orch.start_prediction_batch();
    let mut last = (BatchPreparationStatus::NotPrepared, BatchPreparationStatus::NotPrepared);
    loop {
        orch.poll()?;
        let now = (orch.training_status(), orch.prediction_status());
        if now != last {
            info!("training batch: {} | prediction batch: {}", now.0, now.1);
            last = now;
        }
        if now.0.is_ready() && now.1.is_ready() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    orch.prepare_model();
    orch.compile_model()?;
    orch.train_model()?;
    let mut reported = 0;
    while orch.is_training() {
        thread::sleep(POLL_INTERVAL);
        orch.poll()?;
        for stats in &orch.epoch_history()[reported..] {
            info!("{} (accuracy {:.2}%)", stats.status_line(), stats.train_accuracy * 100.0);
        }
        reported = orch.epoch_history().len();
    }
    info!("{}", orch.model_status());

    orch.test_model()?;
    info!("{}", orch.accuracy_label());

    if let Some(path) = image_path {
        let bytes = std::fs::read(&path).map_err(|e| Error::Io { path: path.clone().into(), source: e })?;
        let digit = orch.predict(&image_bytes_to_tensor(&bytes, true)?)?;
        println!("{}: {}", path, digit);
    }
    Ok(())
}
