//! Basic place-name lookup
//!
//! This example demonstrates the fundamental operations:
//! - Building a gazetteer from raw records
//! - Looking up states and cities
//! - Steering ambiguous names with a state hint

use placematch::{Context, DedupeConfig, Entity, Gazetteer, NameNormalizer, StateCode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gazetteer = Gazetteer::from_records(
        &placematch::data_processing::test_data::sample_records(),
        &DedupeConfig::default(),
        NameNormalizer::default(),
    )?;
    println!("{}", gazetteer.info().summary());

    println!("\nCities named 'Springfield':");
    print_results(&gazetteer.lookup_city("Springfield", None), 5);

    println!("\n'Springfield' with an Illinois hint:");
    let context = Context::for_state(StateCode::new("IL")?);
    print_results(&gazetteer.lookup_city("Springfield", Some(&context)), 5);

    println!("\nAbbreviations and nicknames:");
    for query in ["St. Louis", "Mt Vernon", "NYC", "Windy City"] {
        let best = gazetteer.lookup_city(query, None);
        println!("  {query:<12} -> {}", best.first().map_or("nothing".into(), |e| e.to_string()));
    }

    println!("\nStates by code:");
    print_results(&gazetteer.lookup_state("TX", None), 1);

    Ok(())
}

fn print_results(results: &[&Entity], limit: usize) {
    for (i, entity) in results.iter().take(limit).enumerate() {
        println!(
            "  {}. {}, {} (population: {})",
            i + 1,
            entity.canonical_name,
            entity.state_code,
            entity.population.map_or("unknown".into(), |p| p.to_string())
        );
    }
    if results.len() > limit {
        println!("  ... and {} more results", results.len() - limit);
    }
}
