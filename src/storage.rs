//! JSONL corpus output.
//!
//! The corpus is a directory of numbered JSONL files. `index-NNNNN.jsonl`
//! holds one small record per document (ids, citation, url, dates) and
//! `documents-NNNNN.jsonl` the matching full records with text. Each file
//! holds at most [`RECORDS_PER_FILE`] records; writing continues in the last
//! file of an existing corpus, and documents already in it are remembered so
//! a re-run can skip them.
//!
//! A document counts as stored once its index record is written, which
//! happens after its full record. A partial line left at the end of the last
//! file by an interrupted run is dropped on open.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Document, DocumentType, Scraped, Section};

/// Maximum records in one corpus file.
pub const RECORDS_PER_FILE: usize = 10_000;

const INDEX_PREFIX: &str = "index";
const DOCUMENTS_PREFIX: &str = "documents";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid record in {path} line {line}: {source}")]
    InvalidRecord {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Summary record written to the index files.
#[derive(Debug, Serialize)]
struct IndexRecord<'a> {
    version_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    source: &'a str,
    #[serde(rename = "type")]
    doc_type: DocumentType,
    jurisdiction: &'a str,
    citation: &'a str,
    url: &'a str,
    date: Option<&'a str>,
    when_scraped: &'a str,
}

impl<'a> From<&'a Document> for IndexRecord<'a> {
    fn from(doc: &'a Document) -> Self {
        Self {
            version_id: doc.version_id(),
            id: None,
            source: doc.source(),
            doc_type: doc.doc_type(),
            jurisdiction: doc.jurisdiction(),
            citation: doc.citation(),
            url: doc.url(),
            date: doc.date(),
            when_scraped: doc.when_scraped(),
        }
    }
}

impl<'a> From<&'a Section> for IndexRecord<'a> {
    fn from(section: &'a Section) -> Self {
        Self {
            version_id: section.version_id(),
            id: Some(section.id()),
            source: section.source(),
            doc_type: section.doc_type(),
            jurisdiction: section.jurisdiction(),
            citation: section.citation(),
            url: section.url(),
            date: section.date(),
            when_scraped: section.when_scraped(),
        }
    }
}

#[derive(Deserialize)]
struct IndexedId {
    version_id: String,
}

fn file_name(prefix: &str, number: usize) -> String {
    format!("{}-{:05}.jsonl", prefix, number)
}

/// Numbered files of a given prefix in `dir`, sorted.
fn existing_files(dir: &Path, prefix: &str) -> Result<Vec<(usize, PathBuf)>, StorageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let path = entry.map_err(io_err(dir))?.path();
        let number = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix))
            .and_then(|n| n.strip_prefix('-'))
            .and_then(|n| n.strip_suffix(".jsonl"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(number) = number {
            files.push((number, path));
        }
    }
    files.sort();
    Ok(files)
}

/// Appends records to numbered JSONL files, starting a new file once the
/// current one is full.
struct RollingJsonl {
    dir: PathBuf,
    prefix: &'static str,
    limit: usize,
    number: usize,
    count: usize,
    writer: Option<BufWriter<File>>,
}

impl RollingJsonl {
    /// Resume after the last existing file of this prefix.
    fn open(dir: &Path, prefix: &'static str, limit: usize) -> Result<Self, StorageError> {
        let (number, count) = match existing_files(dir, prefix)?.pop() {
            Some((number, path)) => (number, complete_records(&path)?),
            None => (0, 0),
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            prefix,
            limit: limit.max(1),
            number,
            count,
            writer: None,
        })
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, StorageError> {
        if self.count >= self.limit {
            self.flush()?;
            self.writer = None;
            self.number += 1;
            self.count = 0;
        }
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let path = self.dir.join(file_name(self.prefix, self.number));
                debug!("Opening {}", path.display());
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(io_err(&path))?;
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    fn write<T: Serialize>(&mut self, record: &T) -> Result<(), StorageError> {
        let line = serde_json::to_string(record)?;
        let path = self.dir.join(file_name(self.prefix, self.number));
        let writer = self.writer()?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(io_err(&path))?;
        self.count += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if let Some(writer) = self.writer.as_mut() {
            let path = self.dir.join(file_name(self.prefix, self.number));
            writer.flush().map_err(io_err(&path))?;
        }
        Ok(())
    }
}

/// Count the complete records in a file, cutting off a trailing partial line.
fn complete_records(path: &Path) -> Result<usize, StorageError> {
    let file = File::open(path).map_err(io_err(path))?;
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut records = 0;
    let mut complete_len = 0u64;
    let mut total_len = 0u64;

    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).map_err(io_err(path))?;
        if read == 0 {
            break;
        }
        total_len += read as u64;
        if line.last() == Some(&b'\n') {
            complete_len = total_len;
            if !line.trim_ascii().is_empty() {
                records += 1;
            }
        }
    }

    if total_len > complete_len {
        warn!(
            "Dropping {} bytes of partial record at the end of {}",
            total_len - complete_len,
            path.display()
        );
        OpenOptions::new()
            .write(true)
            .open(path)
            .and_then(|file| file.set_len(complete_len))
            .map_err(io_err(path))?;
    }
    Ok(records)
}

/// Writer for the corpus directory.
pub struct CorpusWriter {
    dir: PathBuf,
    included: HashSet<String>,
    index: RollingJsonl,
    documents: RollingJsonl,
}

impl CorpusWriter {
    /// Open (or create) a corpus directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_records_per_file(dir, RECORDS_PER_FILE)
    }

    pub fn with_records_per_file(
        dir: impl AsRef<Path>,
        records_per_file: usize,
    ) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let included = load_included(&dir)?;
        if !included.is_empty() {
            info!(
                "Corpus at {} already includes {} documents",
                dir.display(),
                included.len()
            );
        }

        Ok(Self {
            index: RollingJsonl::open(&dir, INDEX_PREFIX, records_per_file)?,
            documents: RollingJsonl::open(&dir, DOCUMENTS_PREFIX, records_per_file)?,
            dir,
            included,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a document with this version id is already stored.
    pub fn contains(&self, version_id: &str) -> bool {
        self.included.contains(version_id)
    }

    /// Number of distinct documents stored.
    pub fn len(&self) -> usize {
        self.included.len()
    }

    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// Append a scraped document, or every section of one.
    pub fn write(&mut self, scraped: &Scraped) -> Result<(), StorageError> {
        match scraped {
            Scraped::Document(doc) => {
                self.documents.write(doc)?;
                self.index.write(&IndexRecord::from(doc))?;
                self.included.insert(doc.version_id().to_string());
            }
            Scraped::Sections(sections) => {
                for section in sections {
                    self.documents.write(section)?;
                    self.index.write(&IndexRecord::from(section))?;
                    self.included.insert(section.version_id().to_string());
                }
            }
        }
        self.flush()
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.index.flush()?;
        self.documents.flush()
    }
}

/// Version ids in the index files. An unreadable last line of the last file
/// is an interrupted write and is skipped; anywhere else it is an error.
fn load_included(dir: &Path) -> Result<HashSet<String>, StorageError> {
    let mut included = HashSet::new();
    let files = existing_files(dir, INDEX_PREFIX)?;
    let last_file = files.len().saturating_sub(1);

    for (n, (_, path)) in files.iter().enumerate() {
        let file = File::open(path).map_err(io_err(path))?;
        let mut lines = BufReader::new(file).lines().enumerate().peekable();
        while let Some((i, line)) = lines.next() {
            let line = line.map_err(io_err(path))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexedId>(&line) {
                Ok(record) => {
                    included.insert(record.version_id);
                }
                Err(e) if n == last_file && lines.peek().is_none() => {
                    warn!(
                        "Ignoring unreadable last record in {} line {}: {}",
                        path.display(),
                        i + 1,
                        e
                    );
                }
                Err(source) => {
                    return Err(StorageError::InvalidRecord {
                        path: path.clone(),
                        line: i + 1,
                        source,
                    })
                }
            }
        }
    }
    Ok(included)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{make_doc, DocumentDraft};
    use std::collections::BTreeMap;

    fn doc(n: usize) -> Scraped {
        let draft = DocumentDraft {
            version_id: format!("example:{}", n),
            doc_type: DocumentType::Decision,
            jurisdiction: "commonwealth".to_string(),
            source: "example".to_string(),
            mime: "text/html".to_string(),
            date: None,
            citation: format!("Case {}", n),
            url: format!("https://example.com/{}", n),
            text: "The court delivered its reasons today.".to_string(),
            other: BTreeMap::new(),
        };
        Scraped::Document(make_doc(draft).unwrap().unwrap())
    }

    fn lines(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_rolls_files_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = CorpusWriter::with_records_per_file(dir.path(), 3).unwrap();
        for n in 0..7 {
            corpus.write(&doc(n)).unwrap();
        }

        assert_eq!(lines(&dir.path().join("index-00000.jsonl")), 3);
        assert_eq!(lines(&dir.path().join("index-00001.jsonl")), 3);
        assert_eq!(lines(&dir.path().join("index-00002.jsonl")), 1);
        assert_eq!(lines(&dir.path().join("documents-00002.jsonl")), 1);
        assert_eq!(corpus.len(), 7);
    }

    #[test]
    fn test_reopen_resumes_and_remembers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut corpus = CorpusWriter::with_records_per_file(dir.path(), 3).unwrap();
            for n in 0..4 {
                corpus.write(&doc(n)).unwrap();
            }
        }

        let mut corpus = CorpusWriter::with_records_per_file(dir.path(), 3).unwrap();
        assert!(corpus.contains("example:0"));
        assert!(corpus.contains("example:3"));
        assert!(!corpus.contains("example:4"));

        corpus.write(&doc(4)).unwrap();
        corpus.write(&doc(5)).unwrap();
        corpus.write(&doc(6)).unwrap();
        assert_eq!(lines(&dir.path().join("index-00001.jsonl")), 3);
        assert_eq!(lines(&dir.path().join("index-00002.jsonl")), 1);
    }

    #[test]
    fn test_interrupted_write_is_dropped_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut corpus = CorpusWriter::open(dir.path()).unwrap();
            corpus.write(&doc(0)).unwrap();
            corpus.write(&doc(1)).unwrap();
        }
        let index = dir.path().join("index-00000.jsonl");
        let mut file = OpenOptions::new().append(true).open(&index).unwrap();
        file.write_all(br#"{"version_id":"exam"#).unwrap();
        drop(file);

        let mut corpus = CorpusWriter::open(dir.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert!(!corpus.contains("example:2"));

        corpus.write(&doc(2)).unwrap();
        drop(corpus);
        assert_eq!(lines(&index), 3);

        let corpus = CorpusWriter::open(dir.path()).unwrap();
        assert_eq!(corpus.len(), 3);
        assert!(corpus.contains("example:2"));
    }

    #[test]
    fn test_bad_record_before_the_end_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("index-00000.jsonl"),
            "not json\n{\"version_id\":\"example:1\"}\n",
        )
        .unwrap();

        let err = CorpusWriter::open(dir.path()).err().unwrap();
        assert!(matches!(err, StorageError::InvalidRecord { line: 1, .. }));
    }

    #[test]
    fn test_document_is_written_before_its_index_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = CorpusWriter::open(dir.path()).unwrap();

        // A directory where the index file should be makes the index write fail.
        fs::create_dir(dir.path().join("index-00000.jsonl")).unwrap();
        assert!(corpus.write(&doc(7)).is_err());
        assert!(!corpus.contains("example:7"));
        drop(corpus);
        assert_eq!(lines(&dir.path().join("documents-00000.jsonl")), 1);
    }

    #[test]
    fn test_records_are_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut corpus = CorpusWriter::open(dir.path()).unwrap();
        corpus.write(&doc(1)).unwrap();

        let index = fs::read_to_string(dir.path().join("index-00000.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(index.trim()).unwrap();
        assert_eq!(record["version_id"], "example:1");
        assert_eq!(record["type"], "decision");
        assert!(record.get("text").is_none());

        let documents = fs::read_to_string(dir.path().join("documents-00000.jsonl")).unwrap();
        let record: serde_json::Value = serde_json::from_str(documents.trim()).unwrap();
        assert_eq!(record["text"], "The court delivered its reasons today.");
        assert_eq!(record["citation"], "Case 1");
    }
}
