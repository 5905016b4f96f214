use anyhow::Result;
use env_logger::Env;
use gazerbeam::TrackerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (action, log_mode) = gazerbeam::parse_args(&args)?;

    gazerbeam::init_gaze_tracker(TrackerConfig::load());
    let trace_path = gazerbeam::start_gaze_tracking()?;
    log::info!("tracing gaze to {}", trace_path.display());

    gazerbeam::start_gaze_session(action, log_mode)?;

    let interrupt = tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, stopping session");
            gazerbeam::request_gaze_stop();
        }
    });

    gazerbeam::wait_for_gaze_session().await;
    interrupt.abort();

    if let Some(path) = gazerbeam::stop_gaze_tracking().await {
        log::info!("gaze trace written to {}", path.display());
    }
    Ok(())
}
