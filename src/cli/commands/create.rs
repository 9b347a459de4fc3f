//! The `create` command.

use console::style;

use oalc_creator::config::Config;
use oalc_creator::engine::Engine;
use oalc_creator::scrapers::ConfigurableScraper;
use oalc_creator::storage::CorpusWriter;

/// Scrape the selected sources (all when none are given) into the corpus.
pub async fn cmd_create(
    config: &Config,
    source_ids: &[String],
    show_progress: bool,
) -> anyhow::Result<()> {
    if config.scrapers.is_empty() {
        println!(
            "{} No sources configured. Add [scrapers.<source>] tables to oalc.toml.",
            style("!").yellow()
        );
        return Ok(());
    }

    let selected: Vec<String> = if source_ids.is_empty() {
        config.scrapers.keys().cloned().collect()
    } else {
        let unknown: Vec<&String> = source_ids
            .iter()
            .filter(|id| !config.scrapers.contains_key(id.as_str()))
            .collect();
        if !unknown.is_empty() {
            println!(
                "Available sources: {}",
                config.scrapers.keys().cloned().collect::<Vec<_>>().join(", ")
            );
            anyhow::bail!(
                "Unknown source(s): {}",
                unknown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        source_ids.to_vec()
    };

    let output_dir = config.output_dir();
    let mut corpus = CorpusWriter::open(&output_dir)?;
    let engine = Engine::new(config)?.with_progress(show_progress);

    println!(
        "{} Scraping {} source{} into {}",
        style("→").cyan(),
        selected.len(),
        if selected.len() == 1 { "" } else { "s" },
        output_dir.display()
    );

    let mut failed = Vec::new();
    for source in &selected {
        let scraper_config = config.scrapers[source.as_str()].clone();
        let result = match ConfigurableScraper::new(source, scraper_config, engine.context().clone())
        {
            Ok(scraper) => engine.run(&scraper, &mut corpus).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                let mark = if report.failed + report.failed_indices > 0 {
                    style("!").yellow()
                } else {
                    style("✓").green()
                };
                println!("  {} {}", mark, report);
            }
            Err(e) => {
                println!("  {} {}: {}", style("✗").red(), source, e);
                failed.push(source.as_str());
            }
        }
    }

    engine.close().await;

    println!(
        "{} Corpus holds {} documents",
        style("✓").green(),
        corpus.len()
    );

    if !failed.is_empty() {
        anyhow::bail!("{} source(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
