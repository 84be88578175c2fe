use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kms_signer::signing::KeyMetadata;
use kms_signer::{LocalKeyVault, ProviderCache, RemoteSigningClient, SignIntent};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(about = "Sign and verify files with a KMS-held RSA key")]
struct Args {
    /// Seed for the key held by the local vault.
    #[clap(long, env = "KMS_KEY_SEED")]
    key_seed: String,
    #[clap(long, env = "KMS_KEY_NAME", default_value = "signing-key")]
    key_name: String,
    #[clap(long, env = "KMS_KEY_BITS", default_value = "2048")]
    key_bits: usize,
    #[clap(long, env = "SIGNING_ALGORITHM", default_value = "RSA-SHA256")]
    algorithm: String,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a file and print the hex signature.
    Sign {
        #[clap(long)]
        input: PathBuf,
    },
    /// Verify a hex signature over a file.
    Verify {
        #[clap(long)]
        input: PathBuf,
        #[clap(long)]
        signature: String,
    },
    /// Print the key's metadata as reported by the vault.
    KeyInfo,
}

#[derive(Serialize)]
struct SignOutput<'a> {
    key_id: &'a str,
    algorithm: &'a str,
    signature: String,
}

#[derive(Serialize)]
struct VerifyOutput {
    valid: bool,
}

#[derive(Serialize)]
struct KeyInfoOutput<'a> {
    key_id: &'a str,
    #[serde(flatten)]
    metadata: KeyMetadata,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if run(Args::parse()).await? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Executes one command. `Ok(false)` means a signature did not verify.
async fn run(args: Args) -> Result<bool> {
    let vault = Arc::new(LocalKeyVault::new());
    let key = vault
        .create_key_from_seed(&args.key_name, &args.key_seed, args.key_bits)
        .context("creating key in local vault")?;
    let cache = ProviderCache::new(vault.clone());

    match args.command {
        Command::Sign { input } => {
            let payload = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let provider = cache
                .get_or_create(&key, &args.algorithm, SignIntent::Sign)
                .context("creating signature provider")?;
            let signature = provider.sign_async(payload).await;
            cache.release(&provider);
            let signature = signature.context("signing payload")?;

            let output = SignOutput {
                key_id: key.key_id(),
                algorithm: provider.spec().algorithm.as_str(),
                signature: hex::encode(signature),
            };
            println!("{}", serde_json::to_string(&output)?);
        }
        Command::Verify { input, signature } => {
            let payload = std::fs::read(&input)
                .with_context(|| format!("reading {}", input.display()))?;
            let signature = hex::decode(signature.trim()).context("decoding hex signature")?;
            let provider = cache
                .get_or_create(&key, &args.algorithm, SignIntent::Verify)
                .context("creating signature provider")?;
            let valid = provider.verify_async(payload, signature).await;
            cache.release(&provider);
            let valid = valid.context("verifying signature")?;

            println!("{}", serde_json::to_string(&VerifyOutput { valid })?);
            return Ok(valid);
        }
        Command::KeyInfo => {
            let metadata = vault
                .get_key_metadata(key.key_id())
                .context("fetching key metadata")?;
            let output = KeyInfoOutput {
                key_id: key.key_id(),
                metadata,
            };
            println!("{}", serde_json::to_string(&output)?);
        }
    }

    Ok(true)
}
