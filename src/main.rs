#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use domain::models::Action;
use domain::models::Event;
use tokio::sync::mpsc;
use tokio::task;
use yansi::Paint;

use crate::application::cli;
use crate::application::terminal;
use crate::domain::services::ChatOptions;
use crate::domain::services::ChatService;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        Paint::red(format!(
            "Oh no! chatline has failed with the following version and error.\n\nVersion: {}\nError: {}",
            env!("CARGO_PKG_VERSION"),
            err
        ))
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let log_path = cli::log_path();
    let log_dir = log_path
        .parent()
        .map(|dir| return dir.to_path_buf())
        .unwrap_or_else(env::temp_dir);
    let file_appender = tracing_appender::rolling::never(log_dir, "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    if env::var("RUST_LOG")
        .unwrap_or_else(|_| return "".to_string())
        .contains("chatline")
    {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(writer)
            .init();
    }

    let ready = match cli::parse().await {
        Ok(ready) => ready,
        Err(err) => {
            handle_error(err);
            return;
        }
    };
    if !ready {
        process::exit(0);
    }

    let options = match ChatOptions::from_config() {
        Ok(options) => options,
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<Action>();
    let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

    let mut background_futures = task::JoinSet::new();
    background_futures.spawn(async move {
        let service = ChatService::new(options, event_tx).await;
        return service.start(&mut action_rx).await;
    });

    let terminal_res = terminal::start(action_tx, event_rx).await;
    let service_res = match background_futures.join_next().await {
        Some(Ok(res)) => res,
        Some(Err(err)) => Err(err.into()),
        None => Ok(()),
    };

    if let Err(err) = terminal_res.and(service_res) {
        handle_error(err);
    }

    process::exit(0);
}
