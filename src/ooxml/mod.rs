//! OOXML spreadsheet parts and the zip containers that hold them

pub mod package;
pub mod stylesheet;
pub mod worksheet;
pub mod xml_writer;
pub mod zip_io;

pub use package::PartLocator;
pub use xml_writer::XmlWriter;
pub use zip_io::{ContainerReader, ContainerWriter};
