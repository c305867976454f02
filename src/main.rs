use clap::Parser;
use festa::{resolve_status, Catalog, CatalogConfig, CatalogSources, Location};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "festa")]
#[command(about = "Find events near a coordinate in an offline festa index")]
struct Args {
    /// Envelope JSON
    #[arg(long)]
    envelope: PathBuf,

    /// Payload blob (default: the envelope's payloadFile, next to it)
    #[arg(long)]
    payload: Option<PathBuf>,

    #[arg(long, allow_hyphen_values = true)]
    lat: f64,

    #[arg(long, allow_hyphen_values = true)]
    lng: f64,

    /// Search radius in meters
    #[arg(long, default_value_t = 5_000.0)]
    radius: f64,

    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Order by recommendation score instead of distance
    #[arg(long)]
    rank: bool,

    #[arg(long, env = "FESTA_KEY_SEED", default_value = "", hide_env_values = true)]
    key_seed: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("festa=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let sources = CatalogSources::from_paths(&args.envelope, args.payload.as_deref())?;
    let config = CatalogConfig::from_env().with_key_seed(args.key_seed);
    let catalog = Catalog::open(sources, config);

    if let Some(reason) = catalog.unusable_reason() {
        eprintln!("Index unusable: {reason}");
        std::process::exit(2);
    }

    let center = Location::new(args.lat, args.lng);
    let now = chrono::Utc::now();
    let results = if args.rank {
        catalog.recommend(center, now, args.limit, args.radius, festa::DEFAULT_RECOMMEND_POOL)
    } else {
        catalog
            .search(center, args.radius, args.limit)
            .into_iter()
            .map(|place| {
                let score = festa::scoring::score(&place, now);
                (place, score)
            })
            .collect()
    };

    if results.is_empty() {
        println!("No events found");
        return Ok(());
    }

    for (place, score) in results {
        let status = resolve_status(place.start_at, place.end_at, now);
        println!("{}", place.name);
        println!("  Category: {}", place.category.as_str());
        println!("  Distance: {:.2} km", place.distance_km());
        println!("  Status: {}", status.label());
        if let Some(start) = place.start_at {
            println!("  Starts: {}", start.with_timezone(&catalog.config().timezone));
        }
        if let Some(venue) = &place.venue {
            println!("  Venue: {venue}");
        }
        println!(
            "  Score: {:.3} (space {:.2}, time {:.2}, heat {:.2})",
            score.total, score.space, score.time, score.heat
        );
        println!("  Coords: {}, {}", place.location.latitude, place.location.longitude);
    }

    Ok(())
}
