//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the file-backed store from `EVENTKEEPER_*` settings.
//! - Print a deterministic summary of upcoming and past events.
//! - Save once more before exiting, as a graceful shutdown would.

use eventkeeper_core::{open_file_store, AppConfig, Event, FileEntityStore};
use log::{error, warn};
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = AppConfig::from_env();
    if let Err(err) = eventkeeper_core::init_from_config(&config.logging) {
        eprintln!("logging disabled: {err}");
    }

    println!("eventkeeper_core version={}", eventkeeper_core::core_version());
    println!("data_dir={}", config.storage.data_dir.display());

    let store = match open_file_store(&config.storage) {
        Ok(store) => store,
        Err(err) => {
            error!("event=cli_open module=cli status=error error={err}");
            eprintln!("cannot open event data: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = store.check_accessible() {
        warn!("event=cli_check module=cli status=error error={err}");
        eprintln!("warning: {err}");
    }

    print_summary(&store);

    if let Err(err) = store.persist_now() {
        error!("event=cli_shutdown module=cli status=error error={err}");
        eprintln!("final save failed: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_summary(store: &FileEntityStore) {
    println!(
        "today={} events={} attendees={}",
        store.today(),
        store.event_count(),
        store.attendee_count()
    );

    println!("upcoming:");
    for event in store.list_future() {
        print_event(&event);
    }
    println!("past:");
    for event in store.list_past() {
        print_event(&event);
    }
}

fn print_event(event: &Event) {
    println!(
        "  #{} {} {} @ {} ({} attendees)",
        event.id(),
        event.date(),
        event.name(),
        event.location(),
        event.attendee_count()
    );
}
