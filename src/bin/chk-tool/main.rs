//! chk-tool CLI entry point.

mod cli;

use chk_fetch::keys::{recover_routing_key, ALGO_AES_PCFB_256_SHA256};
use chk_fetch::postprocess::hash_all;
use chk_fetch::{
    ContentKey, HashResult, HashSpec, HashType, PipelineConfig, PostProcessOptions,
    PostProcessWorker,
};
use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::WrapErr;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();

    info!("chk-tool v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Encode {
            routing_key,
            algorithm,
        } => {
            let routing_key = decode_hex(&routing_key)?;
            let algorithm = algorithm.unwrap_or(config.keys.default_algorithm);
            let key = ContentKey::new(&routing_key, algorithm)?;
            println!("{}", hex::encode(key.encode_full()));
            println!("type: {:#06x}", key.type_tag());
        }
        Command::RoutingKey { key } => {
            let buf = decode_hex(&key)?;
            let (routing_key, anomaly) = recover_routing_key(&buf, ALGO_AES_PCFB_256_SHA256)?;
            if let Some(anomaly) = anomaly {
                warn!("Recovered routing key from a non-standard encoding: {anomaly:?}");
            }
            println!("{}", hex::encode(routing_key));
        }
        Command::Hash { input } => {
            let results = match input {
                Some(path) => hash_all(File::open(&path).wrap_err_with(|| open_error(&path))?)?,
                None => hash_all(io::stdin().lock())?,
            };
            for result in results {
                println!("{:<7} {}", result.hash_type, result.to_hex());
            }
        }
        Command::Verify {
            input,
            output,
            sha1,
            sha256,
            sha384,
            sha512,
        } => {
            let expected = [
                (HashType::Sha1, sha1),
                (HashType::Sha256, sha256),
                (HashType::Sha384, sha384),
                (HashType::Sha512, sha512),
            ];
            let hashes = build_spec(expected)?;
            verify(&config, &input, output, hashes)?;
        }
    }

    Ok(())
}

fn decode_hex(value: &str) -> color_eyre::Result<Vec<u8>> {
    hex::decode(value.trim()).wrap_err("key must be hex")
}

fn build_spec(expected: [(HashType, Option<String>); 4]) -> color_eyre::Result<Option<HashSpec>> {
    let mut results = Vec::new();
    for (hash_type, digest) in expected {
        if let Some(digest) = digest {
            results.push(HashResult::from_hex(hash_type, &digest)?);
        }
    }
    if results.is_empty() {
        return Ok(None);
    }
    Ok(Some(HashSpec::new(results)?))
}

fn verify(
    config: &PipelineConfig,
    input: &Path,
    output: Option<PathBuf>,
    hashes: Option<HashSpec>,
) -> color_eyre::Result<()> {
    let source = File::open(input).wrap_err_with(|| open_error(input))?;
    let verifying = hashes.is_some();
    let options = PostProcessOptions {
        hashes,
        filter: None,
    };

    let handle = match output {
        Some(path) => {
            let sink = File::create(&path)
                .wrap_err_with(|| format!("failed to create {}", path.display()))?;
            PostProcessWorker::new(source, sink, options)
        }
        None => PostProcessWorker::new(source, io::stdout(), options),
    }
    .with_config(config.worker.clone())
    .spawn()?;

    handle.wait_until_finished()?;
    io::stdout().flush()?;

    if verifying {
        info!("Content hashes verified for {}", input.display());
    } else {
        info!("Copied {} without verification", input.display());
    }
    Ok(())
}

fn open_error(path: &Path) -> String {
    format!("failed to open {}", path.display())
}
