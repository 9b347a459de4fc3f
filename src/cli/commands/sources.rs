//! The `sources` command.

use console::style;

use oalc_creator::config::Config;

/// List configured sources.
pub fn cmd_sources(config: &Config) -> anyhow::Result<()> {
    if config.scrapers.is_empty() {
        println!(
            "{} No sources configured. Add [scrapers.<source>] tables to oalc.toml.",
            style("!").yellow()
        );
        return Ok(());
    }

    println!("\n{}", style("Sources").bold());
    println!("{}", "-".repeat(100));
    println!("{:<24} {:<28} {:<22} Jurisdiction", "ID", "Name", "Type");
    println!("{}", "-".repeat(100));

    for (id, scraper) in &config.scrapers {
        println!(
            "{:<24} {:<28} {:<22} {}",
            id,
            scraper.name_or(id),
            scraper.doc_type.as_str(),
            scraper.jurisdiction
        );
    }

    Ok(())
}
