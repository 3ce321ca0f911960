//! CITI (Common Instrumentation Transfer and Interchange) file parsing,
//! in-memory record model, and serialization.
//!
//! ```
//! use citi::Record;
//!
//! let text = "CITIFILE A.01.00\nNAME DATA\nVAR FREQ MAG 1\nDATA S RI\n\
//!             VAR_LIST_BEGIN\n1E9\nVAR_LIST_END\nBEGIN\n0.1,0.2\nEND\n";
//! let record = Record::read_str(text).unwrap();
//! assert_eq!(record.name, "DATA");
//! ```

pub mod error;
pub mod numeric;
pub mod parser;
pub mod record;
pub mod serializer;

mod lexer;

pub use error::{CitiError, Result};
pub use record::{DataArray, Device, IndependentVariable, Record};

use std::fs;
use std::path::Path;

impl Record {
    /// Parse a record from an in-memory string.
    pub fn read_str(input: &str) -> Result<Record> {
        parser::parse(input)
    }

    /// Read and parse a record from a file on disk.
    pub fn read_file(path: impl AsRef<Path>) -> Result<Record> {
        let text = fs::read_to_string(path).map_err(CitiError::ReadIo)?;
        Record::read_str(&text)
    }

    /// Serialize this record to its canonical CITI text form.
    pub fn write_str(&self) -> Result<String> {
        serializer::serialize(self)
    }

    /// Serialize this record and write it to a file on disk.
    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = self.write_str()?;
        fs::write(path, text).map_err(CitiError::WriteIo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_example_round_trips() {
        let text = "CITIFILE A.01.00\nNAME DATA\nVAR FREQ MAG 1\nDATA S RI\n\
                    VAR_LIST_BEGIN\n1E9\nVAR_LIST_END\nBEGIN\n0.1,0.2\nEND\n";
        let record = Record::read_str(text).unwrap();
        assert_eq!(record.name, "DATA");
        let rewritten = record.write_str().unwrap();
        let reparsed = Record::read_str(&rewritten).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn read_file_reports_not_found() {
        let err = Record::read_file("/nonexistent/path/does-not-exist.cti").unwrap_err();
        assert_eq!(err.code(), -4);
    }
}
