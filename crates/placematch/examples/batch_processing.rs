//! Batch resolution of free-text mentions
//!
//! Resolving many mentions at once spreads the work over all cores; results come
//! back in input order.

use std::time::Instant;

use placematch::{DedupeConfig, Gazetteer, LookupConfig, NameNormalizer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gazetteer = Gazetteer::from_records(
        &placematch::data_processing::test_data::sample_records(),
        &DedupeConfig::default(),
        NameNormalizer::default(),
    )?;

    let mentions = vec![
        "Springfield, IL",
        "Springfield, Massachusetts",
        "Portland, ME",
        "Kansas City",
        "Saint Louis",
        "Ft. Worth, TX",
        "Cañon City",
        "Big Apple",
        "Atlantis",
    ];

    println!("Resolving {} mentions...", mentions.len());
    let config = LookupConfig::default();

    let start = Instant::now();
    let sequential: Vec<_> = mentions.iter().map(|m| gazetteer.resolve(m, &config)).collect();
    let sequential_time = start.elapsed();

    let start = Instant::now();
    let batched = gazetteer.resolve_bulk(&mentions, &config);
    let batch_time = start.elapsed();

    println!("  Sequential: {sequential_time:?}");
    println!("  Batch:      {batch_time:?}");
    assert_eq!(sequential, batched);

    println!("\nResults:");
    for (mention, resolution) in mentions.iter().zip(&batched) {
        match resolution.best() {
            Some(entity) => println!(
                "  {mention:<28} -> {entity} ({} candidates)",
                resolution.cities.len()
            ),
            None => println!("  {mention:<28} -> unresolved"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_env() {
        let _ = placematch::init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_batch_processing_example() {
        setup_test_env();
        assert!(
            main().is_ok(),
            "Batch processing example should run successfully"
        );
    }
}
