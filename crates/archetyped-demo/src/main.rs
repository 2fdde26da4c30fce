//! archetyped-demo - Extension Orchestration Demo
//!
//! Wires a `math` and a `calculator` extension through the orchestrator and
//! prints the application events as they happen.

use anyhow::Result;
use archetyped::{
    AppConfig, AppEvent, Archetyped, EventBus, HotPlugStrategy, create_app,
};
use clap::Parser;
use colored::Colorize;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod extensions;

use cli::Cli;
use extensions::Calculator;

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("archetyped=info".parse()?))
        .init();

    let cli = Cli::parse();

    let strategy = if cli.reuse {
        HotPlugStrategy::ReuseExisting
    } else {
        HotPlugStrategy::Reinstantiate
    };
    let config = AppConfig::new().with_hot_plug(strategy);

    let mut initial = Vec::new();
    if !cli.missing {
        initial.push(extensions::math());
    }
    if !cli.hot_plug {
        initial.push(extensions::calculator());
    }

    let mut app = if cli.strict {
        let app = create_app(initial, config)?;
        report_events(app.events(), cli.json);
        app
    } else {
        let mut app = Archetyped::with_config(initial, config)?;
        report_events(app.events(), cli.json);
        app.start();
        app
    };

    if cli.hot_plug {
        app.load(vec![extensions::calculator()])?;
    }

    match app
        .services()
        .get("calculator")
        .and_then(|service| service.downcast::<Calculator>())
    {
        Some(calculator) => {
            let result = cli
                .values
                .iter()
                .fold(calculator.start(0), |calculation, &value| calculation.add(value))
                .equals();
            println!("{} {}", "Result:".cyan().bold(), result);
        }
        None => println!("{}", "calculator service is not available".yellow()),
    }

    let hooks = app.destroy();
    println!("{} {} destroy hook(s) run", "Destroyed:".cyan().bold(), hooks);
    Ok(())
}

/// Print every application event
fn report_events(events: &EventBus, as_json: bool) {
    events.subscribe_all(move |event| {
        if as_json {
            println!("{}", event_json(event));
            return;
        }

        match event {
            AppEvent::Service {
                name, extension, ..
            } => println!("  {} service {} ({})", "•".green(), name.bold(), extension.name()),
            AppEvent::Extension(extension) => {
                println!("  {} extension {}", "•".green(), extension.definition().package_path)
            }
            AppEvent::Ready(app) => println!(
                "{} {} service(s): {}",
                "Ready:".green().bold(),
                app.services().len(),
                app.services().names().join(", ")
            ),
            AppEvent::Error(error) => println!("{} {}", "Error:".red().bold(), error),
        }
    });
}

fn event_json(event: &AppEvent<'_>) -> serde_json::Value {
    match event {
        AppEvent::Service {
            name, extension, ..
        } => json!({
            "event": event.kind(),
            "service": name,
            "package": extension.name(),
            "instanceId": extension.instance_id(),
        }),
        AppEvent::Extension(extension) => json!({
            "event": event.kind(),
            "packagePath": extension.definition().package_path,
            "instanceId": extension.instance_id(),
        }),
        AppEvent::Ready(app) => json!({
            "event": event.kind(),
            "services": app.services().names(),
        }),
        AppEvent::Error(error) => json!({
            "event": event.kind(),
            "message": error.to_string(),
            "packagePath": error.definition().map(|d| d.package_path.as_str()),
        }),
    }
}
