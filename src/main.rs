use std::error::Error;

use clap::{Parser, Subcommand};
use eframe::{egui::ViewportBuilder, run_native};
use focus_timer::{communication, config::Config, FocusTimer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// start the duration entry with this instead of the configured duration
    #[clap(long, short)]
    duration: Option<String>,
    /// starting volume in percent
    #[clap(long, short, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// write the default config file
    Init {
        /// overwrite an existing config
        #[clap(long, short)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    // initilize the logger
    simple_file_logger::init_logger!("focus_timer").expect("couldn't initialize logger");

    let args = Args::parse();
    if let Some(Command::Init { force }) = args.command {
        // only writing the config needs to know where it goes
        let config_path = Config::config_path()?;
        if force || !config_path.exists() {
            Config::new().save(&config_path)?;
            log::info!("wrote default config to {}", config_path.display());
        } else {
            log::warn!(
                "config already exists at {}, use --force to overwrite it",
                config_path.display()
            );
        }
    }

    let mut config = Config::for_run(Config::config_path());
    if let Some(volume) = args.volume {
        config.volume = volume;
    }
    let duration_text = args.duration;

    let alarm = communication::spawn_alarm_worker(config.alarm.clone())?;
    let native_options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_title("Focus Timer")
            .with_inner_size([300.0, 200.0]),
        ..Default::default()
    };

    // run the gui
    run_native(
        "Focus Timer",
        native_options,
        Box::new(move |_| {
            let mut timer = FocusTimer::new(config, alarm);
            if let Some(text) = duration_text {
                timer.set_duration_text(text);
            }
            Ok(Box::new(timer))
        }),
    )
    .map_err(Into::into)
}
