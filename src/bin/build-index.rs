use clap::Parser;
use festa::{EncodedRecordItem, IndexBuilder};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "build-index")]
#[command(about = "Encode a JSON array of event records into a festa envelope and payload")]
struct Args {
    /// JSON array of encoded record items
    input: PathBuf,

    /// Envelope path; the payload is written next to it
    #[arg(long, default_value = "events.json")]
    output: PathBuf,

    /// Geohash precision of the buckets (1-8)
    #[arg(long, default_value_t = 5)]
    precision: u8,

    #[arg(long, env = "FESTA_KEY_SEED", hide_env_values = true)]
    key_seed: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("festa=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let records: Vec<EncodedRecordItem> = serde_json::from_slice(&std::fs::read(&args.input)?)?;

    let payload_file = args
        .output
        .with_extension("bin")
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "events.bin".to_string());

    println!("Building index from {} records...", records.len());
    let mut builder = IndexBuilder::new(args.precision, &args.key_seed).with_payload_file(payload_file);
    builder.extend(records);
    let built = builder.build()?;

    let payload_path = built.write(&args.output)?;
    println!(
        "Done! {} buckets, {} records, {} duplicates, {} without location",
        built.stats.buckets,
        built.stats.records_indexed,
        built.stats.duplicates,
        built.stats.records_unlocated
    );
    println!("Envelope: {}", args.output.display());
    println!("Payload: {} ({} KB)", payload_path.display(), built.payload.len() / 1_000);
    Ok(())
}
