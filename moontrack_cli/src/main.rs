//! Moon tracking loop.
//!
//! Loads the observer/rotor configuration, then drives the tracking
//! controller at a fixed interval: every tick the Moon's current position
//! is computed and sent to the rotctld endpoint.

use std::{env, path::PathBuf, process, thread, time::Duration};

use chrono::Utc;
use log::{error, info, warn};
use moon_tracker::{
    ObserverLocation, ParkPosition, PositionCalculator, RotorClient, RotorEndpoint,
    TrackingController,
};

mod config;
use config::Config;

fn main() {
    env_logger::init();

    // Optional config file path as the only argument.
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = match Config::load_or_init(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("cannot load configuration: {e}");
            process::exit(1);
        }
    };
    info!(
        "QTH {} at {} / {}, {} m",
        config.qth, config.latitude, config.longitude, config.elevation_m
    );

    let location =
        match ObserverLocation::from_strings(&config.latitude, &config.longitude, config.elevation_m)
        {
            Ok(loc) => loc,
            Err(e) => {
                error!("{e}");
                process::exit(1);
            }
        };

    // No degraded mode without ephemeris data.
    let calculator = match PositionCalculator::new(location) {
        Ok(calc) => calc,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let rotor = RotorClient::new(RotorEndpoint::new(
        config.rotctld_host.clone(),
        config.rotctld_port,
    ));
    let park = ParkPosition::clamped(
        config.rotctld_park_az,
        config.rotctld_park_el,
        config.rotctld_park_max_el,
    );
    let mut controller = TrackingController::new(calculator, rotor, park);

    let interval = Duration::from_secs(config.tick_interval_secs);
    info!(
        "tracking the Moon every {}s via rotctld at {}:{}",
        config.tick_interval_secs, config.rotctld_host, config.rotctld_port
    );

    // Enter Tracking; this also performs the first tick immediately.
    if let Err(e) = controller.toggle_tracking(Utc::now()) {
        warn!("initial tick failed: {e}");
    }

    loop {
        thread::sleep(interval);
        match controller.tick(Utc::now()) {
            Ok(position) => {
                if controller.below_horizon() {
                    info!(
                        "moon az {:.2} el {:.2} (below horizon)",
                        position.azimuth, position.elevation
                    );
                } else {
                    info!("moon az {:.2} el {:.2}", position.azimuth, position.elevation);
                }
            }
            // The next tick is the retry; nothing to unwind here.
            Err(e) => warn!("tick failed: {e}"),
        }
    }
}
