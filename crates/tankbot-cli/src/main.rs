//! `tankbot` – starts the orchestration core behind the WebSocket cockpit.
//!
//! 1. Loads `~/.tankbot/config.toml`, writing defaults on first run.
//! 2. Wires simulated hardware (`mock_mode = true`) or whatever drivers are
//!    available, substituting no-op stand-ins for the rest.
//! 3. Starts the sensor loop and serves the cockpit until the server fails
//!    or **Ctrl-C** arrives, which triggers an emergency stop before a
//!    clean shutdown.

mod config;

use std::sync::Arc;

use colored::Colorize;
use tankbot_cockpit::CockpitServer;
use tankbot_hal::{Hardware, SimRig};
use tankbot_runtime::{Robot, init_tracing};
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::config::Config;

fn main() {
    let _telemetry = init_tracing("tankbot");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => cfg,
        Ok(None) => first_run(),
        Err(e) => {
            warn!(error = %e, "could not load config; continuing with defaults");
            let mut cfg = Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start async runtime");
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cfg));
}

async fn run(cfg: Config) {
    let hardware = if cfg.mock_mode {
        info!("mock mode: using simulated hardware");
        SimRig::mock().hardware()
    } else {
        let hw = Hardware::builder().build();
        if !hw.fallbacks().is_empty() {
            warn!(components = ?hw.fallbacks(), "running with no-op drivers");
        }
        hw
    };

    let robot = Arc::new(Robot::new(hardware, cfg.robot.clone()));
    robot.start();

    let interrupted = Arc::new(Notify::new());
    let notify = interrupted.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the robot …".yellow().bold());
        notify.notify_one();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; emergency stop on Ctrl-C unavailable");
    }

    println!(
        "  {} ws://0.0.0.0:{}/ws",
        "Cockpit listening on".green(),
        cfg.cockpit_port
    );
    println!();

    let server = CockpitServer::new(robot.clone()).with_port(cfg.cockpit_port);
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(error = %e, "cockpit server stopped");
            }
        }
        _ = interrupted.notified() => {
            robot.emergency_stop("ctrl-c").await;
        }
    }

    robot.shutdown().await;
    println!("{}", "  ✓ Motors stopped. Exiting tankbot.".green());
}

fn first_run() -> Config {
    let mut cfg = Config::default();
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} {}",
            "Wrote default config to".dimmed(),
            config::config_path().display()
        ),
        Err(e) => warn!(error = %e, "could not write default config"),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn print_banner() {
    println!();
    println!("{}", r#"  _              _    _           _   "#.bold().cyan());
    println!("{}", r#" | |_ __ _ _ __ | | _| |__   ___ | |_ "#.bold().cyan());
    println!("{}", r#" | __/ _` | '_ \| |/ / '_ \ / _ \| __|"#.bold().cyan());
    println!("{}", r#" | || (_| | | | |   <| |_) | (_) | |_ "#.bold().cyan());
    println!("{}", r#"  \__\__,_|_| |_|_|\_\_.__/ \___/ \__|"#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "tankbot".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Tank robot autonomy core");
    println!();
}
