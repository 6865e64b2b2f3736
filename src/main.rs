mod config;
mod driver;
mod error;
mod reddit;
mod types;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::*;
use crate::error::PostError;

/// Submit a text post to a subreddit, optionally with link flair.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON post description: subreddit, title, body and optional flair
    #[arg(short, long, value_name = "FILE")]
    post: Option<PathBuf>,
    /// JSON credentials: client_id, client_secret, user_agent, username, password
    #[arg(short, long, value_name = "FILE")]
    settings: Option<PathBuf>,
    /// Where to read credentials from
    #[arg(short, long, value_enum, default_value_t = CredentialSource::File)]
    credentials: CredentialSource,
    /// More logging on stderr, repeat for more (RUST_LOG overrides)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();
    let raw: Vec<String> = env::args_os()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    init_logging(args.verbose);
    if let Err(e) = run(&args, &raw) {
        eprintln!("Error: {e:#}");
        let code = e.downcast_ref::<PostError>().map_or(1, PostError::exit_code);
        std::process::exit(code);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,reddit_poster={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

const VALUE_FLAGS: [(&str, &str); 3] = [
    ("-p", "--post"),
    ("-s", "--settings"),
    ("-c", "--credentials"),
];

/// Flag/value pairs from the raw command line, spelled the way they were typed.
fn typed_flags(raw: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut tokens = raw.iter().skip(1);
    while let Some(token) = tokens.next() {
        if token == "--" {
            break;
        }
        for (short, long) in VALUE_FLAGS {
            if token == short || token == long {
                if let Some(value) = tokens.next() {
                    pairs.push((token.clone(), value.clone()));
                }
                break;
            }
            if let Some(value) = token.strip_prefix(long).and_then(|v| v.strip_prefix('=')) {
                pairs.push((long.to_string(), value.to_string()));
                break;
            }
            if let Some(value) = token.strip_prefix(short).filter(|v| !v.is_empty()) {
                let value = value.strip_prefix('=').unwrap_or(value);
                pairs.push((short.to_string(), value.to_string()));
                break;
            }
        }
    }
    pairs
}

fn echo_flags(raw: &[String]) {
    for (flag, value) in typed_flags(raw) {
        println!("opt is {flag}, arg is {value}");
    }
}

fn run(args: &Args, raw: &[String]) -> Result<()> {
    echo_flags(raw);
    let post_path =
        require_flag(args.post.as_deref(), "post", "-p", "--post").map_err(PostError::from)?;
    let submission = load_submission(post_path)?;
    // The only place the process environment is read.
    let settings = resolve_settings(args.credentials, args.settings.as_deref(), |name| {
        env::var(name).ok()
    })?;
    let submitted = driver::publish(&settings, &submission)
        .with_context(|| format!("cannot post to r/{}", submission.subreddit))?;
    info!(
        id = %submitted.id,
        fullname = %submitted.fullname,
        url = %submitted.url,
        "submitted post"
    );
    Ok(())
}
