use std::env;
use std::path::PathBuf;
use clap::Parser;
use crate::gui::application::run_application;
use crate::error::AppRunError;
use crate::vision::camera::list_cameras;

pub mod command;
pub mod config;
pub mod device;
pub mod error;
pub mod gui;
pub mod midi;
pub mod resources;
pub mod vision;

/// Remote control for the El Poisson singing fish.
#[derive(Parser, Debug)]
#[command(version)]
pub struct Cli {
    /// Path of the config file to use instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the cameras that can be used for mouth recognition and exit
    #[arg(long)]
    pub list_cameras: bool,
}

pub fn init_logging() {
    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).expect("Failed to open LOG_FILE")
        );
    }

    dispatch.apply().expect("Failed to initialize logger");
}

fn print_cameras() -> Result<(), AppRunError> {
    let cameras = list_cameras()?;

    println!("{:<5} | {}", "Index", "Name");
    println!("{}", "-".repeat(40));
    for (index, name) in cameras {
        println!("{:<5} | {}", index, name);
    }

    Ok(())
}

pub fn run(args: env::Args) -> Result<(), AppRunError> {
    let cli = Cli::parse_from(args);

    if cli.list_cameras {
        return print_cameras();
    }

    run_application(cli.config)?;
    Ok(())
}
