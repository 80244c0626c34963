//! Buffered XML writer for package parts

use crate::error::Result;
use std::io::Write;

/// XML writer that batches small writes before handing them to the sink
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    flush_threshold: usize,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_capacity(writer, 8192)
    }

    pub fn with_capacity(writer: W, capacity: usize) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(capacity),
            flush_threshold: capacity / 2,
        }
    }

    #[inline]
    fn auto_flush(&mut self) -> Result<()> {
        if self.buffer.len() >= self.flush_threshold {
            self.drain()?;
        }
        Ok(())
    }

    /// Write raw bytes (caller guarantees they are well-formed XML)
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        self.auto_flush()
    }

    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Standard declaration every part starts with
    pub fn declaration(&mut self) -> Result<()> {
        self.write_raw(b"<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")
    }

    /// Open a start tag (`<name`), attributes may follow
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.buffer.push(b'<');
        self.write_str(name)
    }

    /// Close a start tag opened with `start_element`
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close a start tag as self-closing (`/>`)
    #[inline]
    pub fn close_empty(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.buffer.extend_from_slice(b"</");
        self.buffer.extend_from_slice(name.as_bytes());
        self.write_raw(b">")
    }

    /// `<name/>`
    #[inline]
    pub fn empty_element(&mut self, name: &str) -> Result<()> {
        self.start_element(name)?;
        self.close_empty()
    }

    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"=\"");
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        let digits = buf.format(value);
        self.buffer.push(b' ');
        self.buffer.extend_from_slice(name.as_bytes());
        self.buffer.extend_from_slice(b"=\"");
        self.buffer.extend_from_slice(digits.as_bytes());
        self.write_raw(b"\"")
    }

    /// `<name>text</name>` with the text escaped
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<()> {
        self.start_element(name)?;
        self.close_start_tag()?;
        self.write_escaped(text)?;
        self.end_element(name)
    }

    /// Write an integer as element text
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) -> Result<()> {
        let mut buf = itoa::Buffer::new();
        let digits = buf.format(value);
        self.write_str(digits)
    }

    /// Write text content with XML escaping
    ///
    /// Characters XML 1.0 cannot carry (controls other than tab, LF, CR)
    /// become `_xHHHH_`, and an underscore that would otherwise read as
    /// such an escape becomes `_x005F_`.
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        for (index, ch) in text.char_indices() {
            match ch {
                '&' => self.buffer.extend_from_slice(b"&amp;"),
                '<' => self.buffer.extend_from_slice(b"&lt;"),
                '>' => self.buffer.extend_from_slice(b"&gt;"),
                '"' => self.buffer.extend_from_slice(b"&quot;"),
                '\'' => self.buffer.extend_from_slice(b"&apos;"),
                '_' if is_ooxml_escape(&text[index..]) => {
                    self.buffer.extend_from_slice(b"_x005F_")
                }
                c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {
                    self.buffer
                        .extend_from_slice(format!("_x{:04X}_", c as u32).as_bytes());
                }
                c => {
                    let mut buf = [0u8; 4];
                    self.buffer
                        .extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        self.auto_flush()
    }

    fn drain(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush buffered bytes and the underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Whether `text` starts with an `_xHHHH_` escape
pub fn is_ooxml_escape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}
