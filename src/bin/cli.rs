//! kvwire CLI Client
//!
//! Sends one command to a server and prints the decoded reply.

use std::process::ExitCode;

use clap::Parser;
use kvwire::{Command, Config, ConnectionSpec, EncodingMode, Reply, SyncConnection};
use tracing_subscriber::{fmt, EnvFilter};

/// kvwire CLI
#[derive(Parser, Debug)]
#[command(name = "kvwire-cli")]
#[command(about = "Send a command to a key-value server")]
#[command(version)]
struct Args {
    /// Server address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    server: String,

    /// Database index to select
    #[arg(short, long, default_value = "0")]
    db: u32,

    /// Password for AUTH
    #[arg(short, long)]
    password: Option<String>,

    /// Encode every request in the count-prefixed form
    #[arg(long)]
    multi_bulk: bool,

    /// Command name followed by its arguments
    #[arg(required = true, num_args = 1..)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,kvwire=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("(error) {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> kvwire::Result<()> {
    let command: Command = args.command[0].parse()?;
    let command_args: Vec<&[u8]> = args.command[1..].iter().map(|a| a.as_bytes()).collect();

    let encoding = if args.multi_bulk {
        EncodingMode::MultiBulk
    } else {
        EncodingMode::Shaped
    };

    let mut spec = ConnectionSpec::new(&args.server)
        .database(args.db)
        .config(Config::builder().encoding(encoding).read_timeout_ms(30_000).build());
    if let Some(password) = &args.password {
        spec = spec.password(password.as_bytes());
    }

    let mut conn = SyncConnection::connect(&spec)?;
    let response = conn.service_request(command, &command_args)?;

    let status = response.status()?;
    if status.is_error() {
        println!("(error) {}", status.message.as_deref().unwrap_or(""));
        return Ok(());
    }

    print_reply(response.reply()?, 0);
    Ok(())
}

fn print_reply(reply: &Reply, indent: usize) {
    let pad = " ".repeat(indent);
    match reply {
        Reply::None => println!("{}OK", pad),
        Reply::Queued => println!("{}QUEUED", pad),
        Reply::Number(n) => println!("{}(integer) {}", pad, n),
        Reply::Boolean(b) => println!("{}(boolean) {}", pad, b),
        Reply::Text(s) => println!("{}{}", pad, s),
        Reply::Error(e) => println!("{}(error) {}", pad, e),
        Reply::Bulk(None) | Reply::MultiBulk(None) | Reply::Aggregate(None) => {
            println!("{}(nil)", pad)
        }
        Reply::Bulk(Some(value)) => println!("{}\"{}\"", pad, String::from_utf8_lossy(value)),
        Reply::MultiBulk(Some(values)) => {
            if values.is_empty() {
                println!("{}(empty list)", pad);
            }
            for (i, value) in values.iter().enumerate() {
                match value {
                    Some(v) => println!("{}{}) \"{}\"", pad, i + 1, String::from_utf8_lossy(v)),
                    None => println!("{}{}) (nil)", pad, i + 1),
                }
            }
        }
        Reply::Aggregate(Some(items)) => {
            if items.is_empty() {
                println!("{}(empty list)", pad);
            }
            for (i, item) in items.iter().enumerate() {
                println!("{}{})", pad, i + 1);
                print_reply(item, indent + 3);
            }
        }
    }
}
