use airthings_wave_mqtt::app::{self, RunError};
use airthings_wave_mqtt::config::Config;
use clap::Parser;
use log::{error, info};
use std::panic::{self, PanicHookInfo};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C"),
        Err(e) => {
            error!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Clean exit codes for process managers (systemd, cron) watching the status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = Config::parse();

    match app::run(&config, shutdown_signal()).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(RunError::CycleFailed(stage)) => {
            error!("Single cycle failed while {}", stage);
            std::process::exit(EXIT_ERROR);
        }
        Err(why) => {
            error!("{}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
