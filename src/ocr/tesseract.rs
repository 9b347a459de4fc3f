//! Poppler and Tesseract command-line wrappers.
//!
//! Everything here blocks; callers run it on the blocking pool.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::OcrError;

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Handle command output, extracting stdout on success or returning appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &'static str,
) -> Result<String, OcrError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(OcrError::Failed {
                    tool: tool_name,
                    message: stderr.trim().to_string(),
                })
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::ToolNotFound(tool_name)),
        Err(e) => Err(OcrError::Io(e)),
    }
}

/// Number of pages in a PDF, read from `pdfinfo`.
pub fn page_count(pdf_path: &Path) -> Result<u32, OcrError> {
    let info = handle_cmd_output(Command::new("pdfinfo").arg(pdf_path).output(), "pdfinfo")?;

    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|count| count.trim().parse().ok())
        .ok_or_else(|| OcrError::Failed {
            tool: "pdfinfo",
            message: "no page count in output".to_string(),
        })
}

/// Render one page to a PNG next to `output_prefix`.
pub fn render_page(
    pdf_path: &Path,
    page: u32,
    dpi: u32,
    output_prefix: &Path,
) -> Result<PathBuf, OcrError> {
    let page_str = page.to_string();
    let dpi_str = dpi.to_string();

    handle_cmd_output(
        Command::new("pdftoppm")
            .args(["-png", "-singlefile", "-r", &dpi_str, "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg(output_prefix)
            .output(),
        "pdftoppm",
    )?;

    let image = output_prefix.with_extension("png");
    if image.exists() {
        Ok(image)
    } else {
        Err(OcrError::Failed {
            tool: "pdftoppm",
            message: format!("no image generated for page {}", page),
        })
    }
}

/// Run Tesseract on an image file.
pub fn recognise(image_path: &Path, language: &str) -> Result<String, OcrError> {
    handle_cmd_output(
        Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", language])
            .output(),
        "tesseract",
    )
}

/// Render and recognise a single page, removing the intermediate image.
pub fn ocr_page(
    pdf_path: &Path,
    page: u32,
    dpi: u32,
    language: &str,
    work_dir: &Path,
) -> Result<String, OcrError> {
    let prefix = work_dir.join(format!("page-{}", page));
    let image = render_page(pdf_path, page, dpi, &prefix)?;
    let text = recognise(&image, language);
    let _ = std::fs::remove_file(&image);
    text
}

/// Extract the embedded text layer, preserving layout.
pub fn text_layer(pdf_path: &Path) -> Result<String, OcrError> {
    handle_cmd_output(
        Command::new("pdftotext")
            .args(["-layout"])
            .arg(pdf_path)
            .arg("-")
            .output(),
        "pdftotext",
    )
}
