mod logging;

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{eyre, Result};
use tracing::{info, warn};

use wakeful_core::Session;
use wakeful_platform::SystemPowerSource;

#[cfg(target_os = "macos")]
use wakeful_platform::macos::MacOSInhibitor;
#[cfg(not(target_os = "macos"))]
use wakeful_platform::portable::PortableInhibitor;

const TOOL_NAME: &str = "wakeful";

/// Prevents your machine from going to sleep
/// https://github.com/wakeful-sh/wakeful
#[derive(Debug, Parser)]
#[command(name = "wakeful", version, disable_version_flag = true, verbatim_doc_comment)]
struct Cli {
    /// Prevent the display from idle sleeping
    #[arg(short = 'd', long)]
    display_sleep: bool,

    /// Prevent the system from idle sleeping (on by default when no
    /// sleep flag is given)
    #[arg(short = 's', long)]
    system_sleep: bool,

    /// Timeout in seconds until the sleep prevention expires (0 = indefinite)
    #[arg(short = 't', long, value_name = "N", default_value_t = 0)]
    timeout: u64,

    /// Release the hold once battery capacity drops to this percentage
    /// (0 = no threshold)
    #[arg(
        short = 'b',
        long,
        value_name = "N",
        default_value_t = 0,
        value_parser = clap::value_parser!(u8).range(0..=100)
    )]
    battery_level: u8,

    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

/// Why the foreground thread woke up.
enum Outcome {
    TimedOut,
    BatteryThreshold(f32),
}

/// If neither sleep flag is supplied, prevent system sleep.
fn sleep_policy(cli: &Cli) -> (bool, bool) {
    if !cli.system_sleep && !cli.display_sleep {
        (true, false)
    } else {
        (cli.system_sleep, cli.display_sleep)
    }
}

#[cfg(target_os = "macos")]
fn new_session(source: Arc<SystemPowerSource>) -> Session<MacOSInhibitor, SystemPowerSource> {
    Session::new(TOOL_NAME, MacOSInhibitor::new(), source)
}

#[cfg(not(target_os = "macos"))]
fn new_session(source: Arc<SystemPowerSource>) -> Session<PortableInhibitor, SystemPowerSource> {
    Session::new(TOOL_NAME, PortableInhibitor::new(TOOL_NAME), source)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    let (prevent_system, prevent_display) = sleep_policy(&cli);
    let timeout = Duration::from_secs(cli.timeout);

    let source = Arc::new(SystemPowerSource::new());
    let mut session = new_session(source);
    session.set_prevent_system_sleep(prevent_system);
    session.set_prevent_display_sleep(prevent_display);
    session.set_timeout(timeout);

    let (tx, rx) = mpsc::channel();

    let timeout_tx = tx.clone();
    session.set_timeout_handler(Some(Arc::new(move || {
        let _ = timeout_tx.send(Outcome::TimedOut);
    })));

    if cli.battery_level > 0 {
        session.set_minimum_battery_capacity(Some(f32::from(cli.battery_level)));
        let battery_tx = tx.clone();
        session.set_battery_threshold_handler(Some(Arc::new(move |capacity| {
            let _ = battery_tx.send(Outcome::BatteryThreshold(capacity));
        })));
    }

    if !session.run() {
        return Err(eyre!("failed to acquire sleep prevention"));
    }

    if timeout.is_zero() {
        info!("keeping the machine awake until interrupted");
    } else {
        info!(
            "keeping the machine awake for {}",
            humantime::format_duration(timeout)
        );
    }

    match rx.recv() {
        Ok(Outcome::TimedOut) => info!("timeout reached, releasing sleep prevention"),
        Ok(Outcome::BatteryThreshold(capacity)) => {
            info!(capacity, "battery threshold reached, sleep prevention released");
        }
        Err(_) => warn!("shutdown channel closed unexpectedly"),
    }

    session.cancel();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_sleep_is_the_default_policy() {
        let cli = Cli::parse_from(["wakeful"]);
        assert_eq!(sleep_policy(&cli), (true, false));
        assert_eq!(cli.timeout, 0);
        assert_eq!(cli.battery_level, 0);
    }

    #[test]
    fn display_only_disables_system_sleep() {
        let cli = Cli::parse_from(["wakeful", "-d"]);
        assert_eq!(sleep_policy(&cli), (false, true));
    }

    #[test]
    fn both_flags_can_be_combined() {
        let cli = Cli::parse_from(["wakeful", "-s", "--display-sleep"]);
        assert_eq!(sleep_policy(&cli), (true, true));
    }

    #[test]
    fn timeout_and_battery_level_parse() {
        let cli = Cli::parse_from(["wakeful", "-t", "300", "-b", "20"]);
        assert_eq!(cli.timeout, 300);
        assert_eq!(cli.battery_level, 20);
    }

    #[test]
    fn battery_level_above_100_is_rejected() {
        assert!(Cli::try_parse_from(["wakeful", "-b", "150"]).is_err());
        assert!(Cli::try_parse_from(["wakeful", "--battery-level", "101"]).is_err());
        assert!(Cli::try_parse_from(["wakeful", "-b", "100"]).is_ok());
    }
}
