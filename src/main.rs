//! HDDcoin Status Monitor
//!
//! Entry point.  Responsibilities:
//!   1. Installs the tracing subscriber.
//!   2. Loads the config.
//!   3. Builds the tokio runtime the poller and tailer run on, and keeps it
//!      entered for the lifetime of the window.
//!   4. Hands off to the Iced application loop.

mod config;
mod error;
mod logging;
mod paths;
mod poller;
mod remote;
mod tailer;
mod ui;
mod version;

use iced::{window, Size, Task};
use tracing::error;

use crate::config::Config;

fn main() -> iced::Result {
    logging::init_logging();

    let config = Config::load();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("hddcoin-status-poll")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("could not start background runtime: {e}");
            std::process::exit(1);
        }
    };
    let _guard = runtime.enter();
    let handle = runtime.handle().clone();

    iced::application("HDDcoin Status", ui::App::update, ui::App::view)
        .subscription(ui::App::subscription)
        .theme(ui::App::theme)
        .window(window::Settings {
            size: Size::new(1100.0, 760.0),
            min_size: Some(Size::new(720.0, 480.0)),
            resizable: true,
            decorations: true,
            ..Default::default()
        })
        .run_with(move || {
            let app = ui::App::new(config.clone(), handle.clone());
            (app, Task::none())
        })
}
