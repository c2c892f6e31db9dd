//! Lookup configuration and persistence
//!
//! This example compares lookup configurations for an ambiguous name and shows how
//! a built gazetteer is saved and reloaded.

use placematch::{
    DedupeConfig, Gazetteer, LookupConfig, LookupConfigBuilder, NameNormalizer,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gazetteer = Gazetteer::from_records(
        &placematch::data_processing::test_data::sample_records(),
        &DedupeConfig::default(),
        NameNormalizer::default(),
    )?;
    let query = "Springfield";

    println!("Comparing lookup configurations for '{query}':\n");
    let configs = [
        ("Default", LookupConfig::default()),
        ("Best only", LookupConfigBuilder::best_only().build()),
        (
            "Soft MA hint",
            LookupConfig::builder().state_code("MA")?.build(),
        ),
        (
            "Strict MA",
            LookupConfig::builder()
                .state_code("MA")?
                .strict_state(true)
                .build(),
        ),
        (
            "Strict 100k+",
            LookupConfig::builder()
                .population_floor(100_000)
                .strict_state(true)
                .build(),
        ),
    ];
    for (label, config) in &configs {
        let results = gazetteer.lookup_city_with_config(query, config);
        let states: Vec<&str> = results.iter().map(|e| e.state_code.as_str()).collect();
        println!("  {label:<14} {states:?}");
    }

    println!("\nTypo tolerance:");
    let lenient = LookupConfigBuilder::lenient().fuzzy(0.8)?.build();
    for typo in ["Sprinfield", "Chicgo", "Bostn"] {
        let exact = gazetteer.lookup_city(typo, None).len();
        let fuzzy = gazetteer.lookup_city_with_config(typo, &lenient);
        println!(
            "  {typo:<12} exact: {exact}, fuzzy best: {}",
            fuzzy.first().map_or("nothing".into(), |e| e.to_string())
        );
    }

    let dir = tempfile::tempdir()?;
    gazetteer.save_to_dir(dir.path())?;
    let reloaded = Gazetteer::load_from_dir(dir.path())?;
    println!("\nReloaded: {}", reloaded.info().summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_env() {
        let _ = placematch::init_logging(tracing::Level::WARN);
    }

    #[test]
    fn test_configuration_example() {
        setup_test_env();
        assert!(main().is_ok(), "Configuration example should run successfully");
    }
}
