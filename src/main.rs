//! flash-b2g - flash nightly B2G builds onto a device

use clap::Parser;
use flash_b2g::cli::Cli;
use flash_b2g::{Event, Flasher, OutputStream};
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    let mut flasher = match Flasher::from_config(config) {
        Ok(flasher) => flasher,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    // Stream tool output as it arrives
    let mut output = flasher.tool_output();
    let printer = tokio::spawn(async move {
        while let Some(event) = output.recv().await {
            if let Event::ToolOutput { tool, stream, line } = event {
                match stream {
                    OutputStream::Stdout => println!("[{}] {}", tool, line),
                    OutputStream::Stderr => eprintln!("[{}] {}", tool, line),
                }
            }
        }
    });

    let request = cli.request();
    let result = flasher.run(&request).await;
    // closing the channel ends the printer once it has drained
    drop(flasher);
    printer.await.ok();

    match result {
        Ok(report) => match report.selector {
            Some(selector) => println!("✓ {} flashed to {}!", selector.device, selector.channel),
            None => println!("✓ Done (only-remotify)"),
        },
        Err(e) => {
            eprintln!("error: {}", e);
            if let flash_b2g::Error::ProcessFailed { tail, .. } = e.root_cause()
                && !tail.is_empty()
            {
                eprintln!("last output:");
                for line in tail {
                    eprintln!("  {}", line);
                }
            }
            process::exit(1);
        }
    }
}
