//! JSON Lines document I/O.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use pipeline::Document;

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Reads one [`Document`] per non-blank line.
pub fn read_documents(reader: impl BufRead) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line)
            .with_context(|| format!("line {} is not a document", index + 1))?;
        documents.push(document);
    }
    Ok(documents)
}

pub fn write_documents(mut writer: impl Write, documents: &[Document]) -> Result<()> {
    for document in documents {
        serde_json::to_writer(&mut writer, document)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads documents from `path`, or stdin for `-`.
pub fn read_path(path: &Path) -> Result<Vec<Document>> {
    if is_stdio(path) {
        return read_documents(io::stdin().lock());
    }
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    read_documents(BufReader::new(file)).with_context(|| format!("in {}", path.display()))
}

/// Writes documents to `path`, or stdout for `-`.
pub fn write_path(path: &Path, documents: &[Document]) -> Result<()> {
    if is_stdio(path) {
        return write_documents(io::stdout().lock(), documents);
    }
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    write_documents(BufWriter::new(file), documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{Annotation, DocumentId};

    #[test]
    fn test_reads_documents_and_skips_blank_lines() {
        let input = concat!(
            "{\"id\":\"a\",\"text\":\"Hello.\"}\n",
            "\n",
            "{\"id\":\"b\",\"text\":\"Hallo.\",\"language\":\"de\"}\n",
        );
        let documents = read_documents(input.as_bytes()).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].language.as_deref(), Some("de"));
        assert!(documents[0].annotations.is_empty());
    }

    #[test]
    fn test_reports_the_offending_line() {
        let input = "{\"id\":\"a\",\"text\":\"ok\"}\nnot json\n";
        let err = read_documents(input.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_files_round_trip_through_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let documents = vec![
            Document::new(DocumentId::new("a").unwrap(), "one")
                .with_language("en"),
            {
                let mut d = Document::new(DocumentId::new("b").unwrap(), "two");
                d.annotations.push(Annotation::new("token", 0, 3));
                d
            },
        ];

        write_path(&path, &documents).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert_eq!(read_path(&path).unwrap(), documents);
    }

    #[test]
    fn test_missing_input_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_path(&dir.path().join("missing.jsonl")).unwrap_err();
        assert!(err.to_string().contains("missing.jsonl"));
    }
}
