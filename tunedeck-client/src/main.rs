//! Tunedeck console entry point.

use tunedeck_client::config::ConsoleConfig;
use tunedeck_client::error::ConsoleError;
use tunedeck_client::telemetry::init_tracing;
use tunedeck_client::Console;
use tunedeck_core::{format_date_range, ApiResult, Event};

const USAGE: &str = "usage: tunedeck [--config <path>] <events|events-by-type|me>";

enum Command {
    Events,
    EventsByType,
    Me,
}

impl Command {
    fn parse(mut args: impl Iterator<Item = String>) -> Option<Self> {
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    args.next();
                }
                "events" => return Some(Self::Events),
                "events-by-type" => return Some(Self::EventsByType),
                "me" => return Some(Self::Me),
                _ => return None,
            }
        }
        None
    }
}

#[tokio::main]
async fn main() -> Result<(), ConsoleError> {
    let Some(command) = Command::parse(std::env::args().skip(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let config = ConsoleConfig::load()?;
    init_tracing(config.log_format)?;
    let console = Console::from_config(&config)?;

    let outcome = match command {
        Command::Events => print_events_by_year(&console).await,
        Command::EventsByType => print_events_by_type(&console).await,
        Command::Me => print_current_user(&console).await,
    };

    if let Err(err) = outcome {
        let err = console.errors().handle(err);
        eprintln!("error: {}", err);
        if err.is_auth() {
            eprintln!("sign in again to refresh the stored token");
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn print_events_by_year(console: &Console) -> ApiResult<()> {
    for group in console.events().by_year(None).await? {
        println!("{}", group.year);
        for event in &group.events {
            print_event(console, event);
        }
    }
    Ok(())
}

async fn print_events_by_type(console: &Console) -> ApiResult<()> {
    for group in console.events().by_type(None).await? {
        println!("{} ({})", group.event_type, group.events.len());
        for event in &group.events {
            print_event(console, event);
        }
    }
    Ok(())
}

fn print_event(console: &Console, event: &Event) {
    let dates = format_date_range(&event.start_date, event.end_date.as_deref(), console.locale());
    let venue = event.venue.as_deref().unwrap_or("-");
    println!(
        "  {:<40} {:<24} {}",
        event.display_name(console.locale()),
        dates,
        venue
    );
}

async fn print_current_user(console: &Console) -> ApiResult<()> {
    let user = console.auth().current_user().await?;
    println!("{} <{}> ({:?})", user.username, user.email, user.role);
    Ok(())
}
