//! Text from word-processor formats: DOCX and RTF.
//!
//! DOCX paragraphs come out separated by a blank line, the same shape
//! [`html_to_text`](super::html_to_text) gives `<p>` elements, so documents
//! converge whichever format a source serves them in.

use std::io::{Cursor, Read};

use encoding_rs::{Encoding, WINDOWS_1252};
use quick_xml::events::Event;
use quick_xml::Reader;

/// MIME type of Word 2007+ documents.
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Largest `word/document.xml` read out of an archive.
const MAX_DOCUMENT_XML_BYTES: u64 = 64 * 1024 * 1024;

/// Extract the body text of a DOCX file.
///
/// The error is a message describing what was wrong with the archive or its
/// XML.
pub fn docx_to_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("word/document.xml: {}", e))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &[u8]) -> Result<String, String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                b"p" => out.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push_str("\n\n"),
                b"tc" => out.push_str("  "),
                b"tr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("invalid document XML: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}

/// Destinations whose content is never shown.
const HIDDEN_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "filetbl",
    "revtbl",
    "object",
    "fldinst",
    "nonshppict",
];

#[derive(Clone, Copy)]
struct Group {
    hidden: bool,
    /// Fallback characters following each `\u`.
    uc: usize,
}

/// Accumulates output, decoding `\'hh` bytes with the document's code page.
struct RtfText {
    out: String,
    bytes: Vec<u8>,
    encoding: &'static Encoding,
}

impl RtfText {
    fn flush(&mut self) {
        if !self.bytes.is_empty() {
            let (text, _) = self.encoding.decode_without_bom_handling(&self.bytes);
            self.out.push_str(&text);
            self.bytes.clear();
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    fn push_str(&mut self, s: &str) {
        self.flush();
        self.out.push_str(s);
    }

    fn push_char(&mut self, c: char) {
        self.flush();
        self.out.push(c);
    }
}

fn code_page(number: i32) -> Option<&'static Encoding> {
    let label = match number {
        65001 => "utf-8".to_string(),
        n => format!("windows-{}", n),
    };
    Encoding::for_label(label.as_bytes())
}

/// Strip RTF markup, keeping the visible text.
///
/// Groups holding fonts, colours, styles, document info, pictures, headers,
/// footers and `\*` destinations are dropped. `\par` and `\line` become
/// newlines, `\uN` and `\'hh` escapes are decoded.
pub fn rtf_to_text(rtf: &[u8]) -> String {
    let mut text = RtfText {
        out: String::new(),
        bytes: Vec::new(),
        encoding: WINDOWS_1252,
    };
    let mut group = Group { hidden: false, uc: 1 };
    let mut stack: Vec<Group> = Vec::new();
    // Fallback characters still to drop after a `\u`.
    let mut skip = 0usize;
    let mut i = 0;

    while i < rtf.len() {
        match rtf[i] {
            b'{' => {
                stack.push(group);
                skip = 0;
                i += 1;
            }
            b'}' => {
                group = stack.pop().unwrap_or(group);
                skip = 0;
                i += 1;
            }
            b'\r' | b'\n' => i += 1,
            b'\\' => {
                i += 1;
                let Some(&next) = rtf.get(i) else { break };

                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < rtf.len() && rtf[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word = String::from_utf8_lossy(&rtf[start..i]).into_owned();

                    let param_start = i;
                    if rtf.get(i) == Some(&b'-') {
                        i += 1;
                    }
                    while i < rtf.len() && rtf[i].is_ascii_digit() {
                        i += 1;
                    }
                    let param = std::str::from_utf8(&rtf[param_start..i])
                        .ok()
                        .and_then(|p| p.parse::<i32>().ok());
                    if rtf.get(i) == Some(&b' ') {
                        i += 1;
                    }

                    match word.as_str() {
                        "bin" => {
                            i += param.unwrap_or(0).max(0) as usize;
                        }
                        "uc" => group.uc = param.unwrap_or(1).max(0) as usize,
                        "ansicpg" => {
                            if let Some(encoding) = param.and_then(code_page) {
                                text.flush();
                                text.encoding = encoding;
                            }
                        }
                        "u" => {
                            if let (false, Some(n)) = (group.hidden, param) {
                                let code = (if n < 0 { n + 65_536 } else { n }) as u32;
                                text.push_char(char::from_u32(code).unwrap_or('\u{fffd}'));
                            }
                            skip = group.uc;
                        }
                        w if HIDDEN_DESTINATIONS.contains(&w) => group.hidden = true,
                        _ if group.hidden => {}
                        "par" | "line" | "sect" | "page" | "row" => text.push_char('\n'),
                        "tab" => text.push_char('\t'),
                        "cell" => text.push_str("  "),
                        "emdash" => text.push_char('\u{2014}'),
                        "endash" => text.push_char('\u{2013}'),
                        "bullet" => text.push_char('\u{2022}'),
                        "lquote" => text.push_char('\u{2018}'),
                        "rquote" => text.push_char('\u{2019}'),
                        "ldblquote" => text.push_char('\u{201c}'),
                        "rdblquote" => text.push_char('\u{201d}'),
                        "emspace" | "enspace" | "qmspace" => text.push_char(' '),
                        _ => {}
                    }
                    continue;
                }

                i += 1;
                match next {
                    b'*' => group.hidden = true,
                    b'\'' => {
                        let byte = rtf
                            .get(i..i + 2)
                            .and_then(|hex| std::str::from_utf8(hex).ok())
                            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                        i += 2;
                        if skip > 0 {
                            skip -= 1;
                        } else if let (false, Some(byte)) = (group.hidden, byte) {
                            text.push_byte(byte);
                        }
                    }
                    b'\\' | b'{' | b'}' => {
                        if skip > 0 {
                            skip -= 1;
                        } else if !group.hidden {
                            text.push_byte(next);
                        }
                    }
                    b'~' if !group.hidden => text.push_char('\u{a0}'),
                    b'_' if !group.hidden => text.push_char('-'),
                    b'\r' | b'\n' if !group.hidden => text.push_char('\n'),
                    _ => {}
                }
            }
            byte => {
                if skip > 0 {
                    skip -= 1;
                } else if !group.hidden {
                    text.push_byte(byte);
                }
                i += 1;
            }
        }
    }

    text.flush();
    text.out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx(document_xml: &str) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = docx(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            r#"<w:p><w:r><w:t>Privacy Act</w:t></w:r><w:r><w:t xml:space="preserve"> 1988</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>An Act to make provision for privacy &amp; related purposes.</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>1</w:t></w:r><w:r><w:tab/><w:t>Short title</w:t></w:r></w:p>"#,
            r#"</w:body></w:document>"#,
        ));

        assert_eq!(
            docx_to_text(&bytes).unwrap(),
            "Privacy Act 1988\n\nAn Act to make provision for privacy & related purposes.\n\n1\tShort title"
        );
    }

    #[test]
    fn test_docx_without_document_is_error() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<w:styles/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(docx_to_text(&bytes).unwrap_err().contains("word/document.xml"));
        assert!(docx_to_text(b"not a zip").is_err());
    }

    #[test]
    fn test_rtf_drops_tables_and_keeps_text() {
        let rtf = br"{\rtf1\ansi\ansicpg1252\deff0{\fonttbl{\f0 Times New Roman;}}{\colortbl;\red0\green0\blue0;}
{\*\generator Riched20;}\pard\f0\fs24 Crimes Act 1900\par
Section 4\tab Definitions\par
The court\rquote s view\'97final.\par
}";
        assert_eq!(
            rtf_to_text(rtf),
            "Crimes Act 1900\nSection 4\tDefinitions\nThe court\u{2019}s view\u{2014}final."
        );
    }

    #[test]
    fn test_rtf_unicode_and_escapes() {
        let rtf = br"{\rtf1\uc1 Caf\u233?\par \{braces\} and \\ slash}";
        assert_eq!(rtf_to_text(rtf), "Caf\u{e9}\n{braces} and \\ slash");
    }
}
