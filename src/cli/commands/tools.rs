//! The `tools` command.

use console::style;

use oalc_creator::ocr::check_tools;

/// Check that the external OCR tools are installed.
pub fn cmd_tools() -> anyhow::Result<()> {
    println!("\n{}", style("OCR Tool Status").bold());
    println!("{}", "-".repeat(50));

    let mut missing = Vec::new();
    for (tool, package, available) in check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            missing.push(package);
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    if !missing.is_empty() {
        missing.dedup();
        println!(
            "\n{} Install {} to scrape PDF sources.",
            style("!").yellow(),
            missing.join(", ")
        );
    }

    Ok(())
}
