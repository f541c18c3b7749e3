//
// Copyright 2026 The Project Oak Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

use std::{fs, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use differential_privacy::{rand::Rand, Mechanism, DEFAULT_DELTA};
use log::info;
use oak_private_analytics::{
    attestation::{FileQuoteProvider, NoQuoteProvider, QuoteProvider},
    context::{AnalyticsContext, UNKNOWN_TIMESTAMP},
    metrics::MetricsBundle,
    release::{ReleaseConfig, DEFAULT_EPSILON},
    service::{process_analytics, verify_response, AnalyticsRequest},
    signing::SigningIdentity,
};

#[derive(clap::Subcommand, Clone, Debug, PartialEq)]
enum Command {
    /// Release a metrics bundle under differential privacy and print the attested response
    Release(ReleaseArgs),
    /// Check the signature of a previously produced response
    Verify(VerifyArgs),
}

#[derive(clap::Args, Clone, Debug, PartialEq)]
struct ReleaseArgs {
    /// Path to the raw metrics bundle in JSON format.
    #[arg(long, value_parser = path_exists)]
    metrics: PathBuf,

    /// Total privacy budget of the release.
    #[arg(long, env = "DP_EPSILON", default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    #[arg(long, env = "DP_DELTA", default_value_t = DEFAULT_DELTA)]
    delta: f64,

    /// Noise mechanism: laplace, gaussian or discrete_gaussian.
    #[arg(long, default_value = "laplace")]
    mechanism: Mechanism,

    /// Spend the full epsilon on every statistic instead of splitting it.
    #[arg(long)]
    no_split: bool,

    /// Include the unprotected input in the signed result. Voids the privacy guarantee.
    #[arg(long)]
    include_raw_metrics: bool,

    /// Path to a pre-generated hardware quote, attached with a note that it does not bind the
    /// signer. Without it the release runs in simulation mode.
    #[arg(long, value_parser = path_exists)]
    quote: Option<PathBuf>,

    /// Path to a hex-encoded secp256k1 secret key. A fresh key is generated when absent.
    #[arg(long, value_parser = path_exists)]
    signing_key: Option<PathBuf>,

    #[arg(long, env = "TEE_TIMESTAMP", default_value = UNKNOWN_TIMESTAMP)]
    processed_at: String,
}

#[derive(clap::Args, Clone, Debug, PartialEq)]
struct VerifyArgs {
    /// Path to a response produced by the `release` command.
    #[arg(long, value_parser = path_exists)]
    response: PathBuf,
}

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

fn path_exists(s: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if !fs::metadata(s).map_err(|err| err.to_string())?.is_file() {
        Err(String::from("path does not represent a file"))
    } else {
        Ok(path)
    }
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    env_logger::init();

    match args.command {
        Command::Release(args) => release(args),
        Command::Verify(args) => verify(args),
    }
}

fn release(args: ReleaseArgs) -> anyhow::Result<()> {
    let metrics = fs::read_to_string(&args.metrics)
        .with_context(|| format!("couldn't read {}", args.metrics.display()))?;
    let metrics = MetricsBundle::from_json(&metrics).context("couldn't parse metrics bundle")?;

    let identity = match &args.signing_key {
        Some(path) => {
            let secret = fs::read_to_string(path)
                .with_context(|| format!("couldn't read {}", path.display()))?;
            let secret = hex::decode(secret.trim()).context("signing key is not valid hex")?;
            SigningIdentity::from_bytes(&secret)?
        }
        None => SigningIdentity::generate(),
    };
    let quote_provider: Box<dyn QuoteProvider> = match &args.quote {
        Some(path) => Box::new(FileQuoteProvider::new(path)),
        None => Box::new(NoQuoteProvider),
    };
    info!("signing address: {}", identity.address());

    let context = AnalyticsContext::new(identity, quote_provider)
        .with_release_defaults(ReleaseConfig {
            epsilon: args.epsilon,
            delta: args.delta,
            split_budget: !args.no_split,
            mechanism: Some(args.mechanism),
            include_metadata: false,
        })
        .with_processed_at(args.processed_at);
    let request = AnalyticsRequest {
        include_raw_metrics: args.include_raw_metrics,
        ..AnalyticsRequest::new(metrics)
    };
    let response = process_analytics(&context, &request, Rand::new()?)
        .context("couldn't process analytics request")?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn verify(args: VerifyArgs) -> anyhow::Result<()> {
    let response = fs::read_to_string(&args.response)
        .with_context(|| format!("couldn't read {}", args.response.display()))?;
    let response: serde_json::Value =
        serde_json::from_str(&response).context("couldn't parse response")?;
    let address = verify_response(&response).context("response failed verification")?;
    println!("signature valid, signed by {}", address);
    Ok(())
}
