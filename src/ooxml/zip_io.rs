//! Thin layer over s-zip for package containers
//!
//! Every s-zip failure is turned into [`ExportError::ContainerCorrupt`]
//! tagged with the pipeline phase and, when known, the dataset.

use super::xml_writer::XmlWriter;
use crate::error::{ExportError, Phase, Result};
use s_zip::{CompressionMethod, StreamingZipReader, StreamingZipWriter};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Chunk size for copying files into entries
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Container being written, with the context used for error reports
pub struct ContainerWriter {
    zip: StreamingZipWriter<File>,
    phase: Phase,
    dataset: Option<String>,
}

impl ContainerWriter {
    /// Create a deflate container at `path`
    pub fn create(
        path: &Path,
        level: u32,
        phase: Phase,
        dataset: Option<&str>,
    ) -> Result<Self> {
        let zip = StreamingZipWriter::with_method(path, CompressionMethod::Deflate, level.min(9))
            .map_err(|e| ExportError::container(phase, dataset, e))?;
        Ok(ContainerWriter {
            zip,
            phase,
            dataset: dataset.map(str::to_string),
        })
    }

    fn fail<E: std::fmt::Display>(&self, err: E) -> ExportError {
        ExportError::container(self.phase, self.dataset.as_deref(), err)
    }

    /// Begin a new entry; subsequent writes go into it
    pub fn start_entry(&mut self, name: &str) -> Result<()> {
        log::debug!("zip: start entry {}", name);
        self.zip.start_entry(name).map_err(|e| self.fail(e))
    }

    /// Write an entry by streaming `source` from disk in fixed-size chunks
    pub fn copy_file_entry(&mut self, name: &str, source: &Path) -> Result<()> {
        self.start_entry(name)?;
        let file = File::open(source).map_err(|e| self.fail(e))?;
        let mut reader = BufReader::with_capacity(COPY_CHUNK_SIZE, file);
        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buffer).map_err(|e| self.fail(e))?;
            if n == 0 {
                break;
            }
            self.zip
                .write_data(&buffer[..n])
                .map_err(|e| self.fail(e))?;
        }
        Ok(())
    }

    /// `io::Write` view of the current entry
    pub fn entry(&mut self) -> EntryWriter<'_> {
        EntryWriter { zip: &mut self.zip }
    }

    /// Write entry `name` through an XML writer
    ///
    /// I/O failures inside the entry are reported as container errors.
    pub fn write_part<F>(&mut self, name: &str, render: F) -> Result<()>
    where
        F: FnOnce(&mut XmlWriter<EntryWriter<'_>>) -> Result<()>,
    {
        self.start_entry(name)?;
        let phase = self.phase;
        let dataset = self.dataset.clone();
        let mut xml = XmlWriter::new(self.entry());
        render(&mut xml)
            .and_then(|_| xml.flush())
            .map_err(|e| e.in_phase(phase, dataset.as_deref()))
    }

    /// Write the central directory and close the file
    pub fn finish(self) -> Result<()> {
        let phase = self.phase;
        let dataset = self.dataset;
        self.zip
            .finish()
            .map_err(|e| ExportError::container(phase, dataset.as_deref(), e))?;
        Ok(())
    }
}

/// Adapter so XML writers can stream straight into a zip entry
pub struct EntryWriter<'a> {
    zip: &'a mut StreamingZipWriter<File>,
}

impl Write for EntryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.zip
            .write_data(buf)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Container opened for reading
pub struct ContainerReader {
    zip: StreamingZipReader,
    phase: Phase,
    dataset: Option<String>,
}

impl ContainerReader {
    pub fn open(path: &Path, phase: Phase, dataset: Option<&str>) -> Result<Self> {
        let zip = StreamingZipReader::open(path)
            .map_err(|e| ExportError::container(phase, dataset, e))?;
        Ok(ContainerReader {
            zip,
            phase,
            dataset: dataset.map(str::to_string),
        })
    }

    /// Entry names in central directory order
    pub fn entry_names(&self) -> Vec<String> {
        self.zip.entries().iter().map(|e| e.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.entries().iter().any(|e| e.name == name)
    }

    fn fail<E: std::fmt::Display>(&self, err: E) -> ExportError {
        ExportError::container(self.phase, self.dataset.as_deref(), err)
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(self.fail(format!("missing part {}", name)))
        }
    }

    /// Decompressed bytes of one entry
    pub fn read(&mut self, name: &str) -> Result<Vec<u8>> {
        self.require(name)?;
        let phase = self.phase;
        self.zip
            .read_entry_by_name(name)
            .map_err(|e| ExportError::container(phase, self.dataset.as_deref(), e))
    }

    /// Stream one entry to `dest`, creating parent directories
    ///
    /// The entry is decompressed on the fly; only one copy buffer is held.
    pub fn extract_to(&mut self, name: &str, dest: &Path) -> Result<u64> {
        self.require(name)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.fail(e))?;
        }
        let file = File::create(dest).map_err(|e| self.fail(e))?;
        let mut out = BufWriter::with_capacity(COPY_CHUNK_SIZE, file);

        let phase = self.phase;
        let dataset = self.dataset.as_deref();
        let fail = |e: &dyn std::fmt::Display| ExportError::container(phase, dataset, e);

        let mut entry = self
            .zip
            .read_entry_streaming_by_name(name)
            .map_err(|e| fail(&e))?;
        let bytes = io::copy(&mut entry, &mut out).map_err(|e| fail(&e))?;
        out.flush().map_err(|e| fail(&e))?;

        log::debug!("zip: extracted {} ({} bytes)", name, bytes);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.zip");
        let source = dir.path().join("part.xml");
        std::fs::write(&source, "<a>chunked</a>").unwrap();

        let mut zip = ContainerWriter::create(&path, 6, Phase::Archive, Some("ds")).unwrap();
        zip.write_part("one.xml", |xml| xml.write_str("<one/>")).unwrap();
        zip.start_entry("two.xml").unwrap();
        zip.entry().write_all(b"<two/>").unwrap();
        zip.copy_file_entry("dir/three.xml", &source).unwrap();
        zip.finish().unwrap();

        let mut reader = ContainerReader::open(&path, Phase::Read, None).unwrap();
        assert_eq!(
            reader.entry_names(),
            vec!["one.xml", "two.xml", "dir/three.xml"]
        );
        assert_eq!(reader.read("two.xml").unwrap(), b"<two/>");

        let out = dir.path().join("x/y/three.xml");
        reader.extract_to("dir/three.xml", &out).unwrap();
        assert_eq!(std::fs::read_to_string(out).unwrap(), "<a>chunked</a>");
    }

    #[test]
    fn test_missing_entry_names_phase_and_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("c.zip");
        let mut zip = ContainerWriter::create(&path, 1, Phase::Archive, None).unwrap();
        zip.write_part("a.xml", |xml| xml.empty_element("a")).unwrap();
        zip.finish().unwrap();

        let mut reader = ContainerReader::open(&path, Phase::Install, Some("orders")).unwrap();
        let err = reader.read("b.xml").unwrap_err();
        assert!(err.to_string().contains("install of dataset 'orders'"));
    }

    #[test]
    fn test_garbage_file_is_container_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.zip");
        std::fs::write(&path, b"not a zip at all").unwrap();

        let err = ContainerReader::open(&path, Phase::Extract, None)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ExportError::ContainerCorrupt {
                phase: Phase::Extract,
                ..
            }
        ));
    }
}
