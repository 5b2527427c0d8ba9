// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SessionConfig;
use crate::crypto::{open, seal, sign, EncryptedEnvelope, SessionId};
use crate::session::{Credentials, SessionStore};
use crate::storage::{HttpBroadcastStore, InMemoryStorage};

/// Broadcast Session CLI
#[derive(Parser, Debug)]
#[command(name = "session-cli")]
#[command(version = "0.1.0")]
#[command(about = "Operator tools for broadcast session records", long_about = None)]
pub struct Cli {
    /// TOML config file (environment variables are used when omitted)
    #[arg(long, global = true, env = "SESSION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a session id and print its public key
    NewSession,

    /// Sign a message with a session key (Keccak-256 + ECDSA, DER hex)
    Sign(SignArgs),

    /// Seal a message to a session's public key
    Seal(SealArgs),

    /// Open an envelope with a session key
    Open(OpenArgs),

    /// Fetch and decrypt a session record from the broadcast server
    Fetch(SessionArgs),

    /// Overwrite a session record with an expiring tombstone
    Invalidate(SessionArgs),
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Session id (64 hex chars)
    #[arg(long, env = "SESSION_ID")]
    pub session_id: String,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Message to sign (UTF-8)
    #[arg(long)]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct SealArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Plaintext to seal (UTF-8)
    #[arg(long)]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Envelope JSON as printed by `seal`
    #[arg(long)]
    pub envelope: String,
}

fn load_config(path: Option<&PathBuf>) -> Result<SessionConfig> {
    let config = match path {
        Some(path) => SessionConfig::from_toml_file(path)?,
        None => SessionConfig::from_env(),
    };
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn parse_session(args: &SessionArgs) -> Result<SessionId> {
    SessionId::parse(&args.session_id).map_err(|e| anyhow!("Invalid session id: {}", e))
}

fn remote_store(config: &SessionConfig) -> Result<SessionStore> {
    let remote = HttpBroadcastStore::new(
        &config.broadcast_url,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(SessionStore::new(
        Arc::new(remote),
        Arc::new(InMemoryStorage::new()),
    ))
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::NewSession => {
            let id = SessionId::generate();
            println!("session_id: {}", id.as_str());
            println!("public_key: {}", id.key_pair().public_key_hex());
            Ok(())
        }
        Commands::Sign(args) => {
            let id = parse_session(&args.session)?;
            let signature = sign(&id.to_bytes(), args.message.as_bytes())?;
            println!("{}", signature.to_der_hex());
            Ok(())
        }
        Commands::Seal(args) => {
            let id = parse_session(&args.session)?;
            let envelope = seal(id.key_pair().public_point(), args.message.as_bytes())?;
            println!("{}", envelope.to_json()?);
            Ok(())
        }
        Commands::Open(args) => {
            let id = parse_session(&args.session)?;
            let envelope = EncryptedEnvelope::from_json(&args.envelope)?;
            let plaintext = open(&id.scalar(), &envelope)?;
            println!(
                "{}",
                String::from_utf8(plaintext).context("Envelope plaintext is not UTF-8")?
            );
            Ok(())
        }
        Commands::Fetch(args) => {
            let config = load_config(cli.config.as_ref())?;
            let id = parse_session(&args)?;
            let store = remote_store(&config)?;

            tracing::info!("Fetching session {} from {}", id.log_prefix(), config.broadcast_url);
            let payload = store.authorize_session(&id).await?;
            match Credentials::from_payload(payload)? {
                Credentials::Active(payload) => {
                    println!("✅ Session active");
                    if let Some(user) = payload.user_info {
                        println!("{}", serde_json::to_string_pretty(&user)?);
                    }
                }
                Credentials::NoSession => println!("Session record holds no credentials"),
            }
            Ok(())
        }
        Commands::Invalidate(args) => {
            let config = load_config(cli.config.as_ref())?;
            let id = parse_session(&args)?;
            remote_store(&config)?.invalidate_session(&id).await?;
            println!("✅ Session invalidated");
            Ok(())
        }
    }
}
