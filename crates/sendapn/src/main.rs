use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use apns::{ApnSession, ApnToken, JsonAps, SessionConfig};

/// Send push notifications through Apple's push notification service.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Client certificate (PEM)
	#[arg(short = 'c', long, value_name = "file")]
	certificate: PathBuf,
	/// Client private key (PEM)
	#[arg(short = 'k', long, value_name = "file")]
	key: PathBuf,
	/// CA bundle used to verify the server
	#[arg(short = 'a', long, value_name = "file")]
	ca: PathBuf,
	/// Bundle id of the receiving application
	#[arg(short = 'b', long)]
	bundle_id: String,
	/// Use the sandbox environment
	#[arg(short = 's', long)]
	sandbox: bool,
	/// Device token to send to
	#[arg(short = 't', long, requires = "message")]
	token: Option<String>,
	/// Message text
	#[arg(short = 'm', long, requires = "token")]
	message: Option<String>,
	/// Read token:sound:title:message lines from standard input
	#[arg(short = 'i', long)]
	interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();
	let args = Args::parse();

	let mut cfg = SessionConfig::new(args.bundle_id.as_str());
	cfg.certificate = Some(args.certificate);
	cfg.key = Some(args.key);
	cfg.ca = Some(args.ca);
	cfg.sandbox = args.sandbox;
	let session = ApnSession::new(cfg).context("failed to set up session")?;

	if args.interactive {
		interactive(&session).await?;
		return Ok(());
	}

	let (Some(token), Some(message)) = (&args.token, &args.message) else {
		anyhow::bail!("either --interactive or both --token and --message are required");
	};
	let token = ApnToken::from_hex(token);
	let payload = JsonAps::body_message(message.as_str());
	let result = session.send(&token, &payload).await;
	println!("{result:?}");
	if !result.is_ok() {
		std::process::exit(1);
	}
	Ok(())
}

async fn interactive(session: &ApnSession) -> Result<()> {
	let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
	while let Some(line) = lines.next_line().await? {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		// token:sound:title:message; the message may itself contain colons.
		let mut parts = line.splitn(4, ':');
		let (Some(token), Some(sound), Some(title), Some(message)) =
			(parts.next(), parts.next(), parts.next(), parts.next())
		else {
			eprintln!("expected token:sound:title:message");
			continue;
		};
		let token = ApnToken::from_hex(token);
		let mut payload = JsonAps::alert_message(title, message, None);
		if !sound.is_empty() {
			payload.aps.sound = Some(sound.to_string());
		}
		let result = session.send(&token, &payload).await;
		println!("{result:?}");
	}
	Ok(())
}
