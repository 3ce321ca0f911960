//! Serialize a [`Record`] back to CITI text, in the exact keyword order a
//! reader expects: header, independent variable, then each data array.

use crate::error::{CitiError, Result};
use crate::numeric::format_real;
use crate::record::Record;
use std::fmt::Write as _;

/// Validate that `record` has everything the format requires before
/// emitting a single line, so a caller never gets a half-written file on a
/// writer that isn't buffered or seekable.
fn validate_for_write(record: &Record) -> Result<()> {
    if record.version.trim().is_empty() {
        return Err(CitiError::WriteMissingVersion);
    }
    if record.name.trim().is_empty() {
        return Err(CitiError::WriteMissingName);
    }
    if record.data.is_empty() {
        return Err(CitiError::WriteMissingDataName);
    }
    for array in &record.data {
        if array.name.trim().is_empty() {
            return Err(CitiError::WriteMissingDataName);
        }
        if array.format.trim().is_empty() {
            return Err(CitiError::WriteMissingDataFormat);
        }
    }
    record.validate_lengths()?;
    Ok(())
}

/// Serialize `record` to its canonical CITI text form.
pub fn serialize(record: &Record) -> Result<String> {
    validate_for_write(record)?;

    let mut out = String::new();
    writeln!(out, "CITIFILE {}", record.version).unwrap();
    writeln!(out, "NAME {}", record.name).unwrap();
    for comment in &record.comments {
        writeln!(out, "! {comment}").unwrap();
    }
    for device in &record.devices {
        for entry in &device.entries {
            writeln!(out, "#{} {entry}", device.name).unwrap();
        }
    }

    let iv = &record.independent_variable;
    writeln!(out, "VAR {} {} {}", iv.name, iv.format, iv.samples.len()).unwrap();

    for array in &record.data {
        writeln!(out, "DATA {} {}", array.name, array.format).unwrap();
    }

    if !iv.samples.is_empty() {
        writeln!(out, "VAR_LIST_BEGIN").unwrap();
        for sample in &iv.samples {
            writeln!(out, "{}", format_real(*sample)).unwrap();
        }
        writeln!(out, "VAR_LIST_END").unwrap();
    }

    for array in &record.data {
        writeln!(out, "BEGIN").unwrap();
        for (re, im) in &array.samples {
            writeln!(out, "{},{}", format_real(*re), format_real(*im)).unwrap();
        }
        writeln!(out, "END").unwrap();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::record::DataArray;

    fn sample_record() -> Record {
        let mut record = Record::new();
        record.name = "DATA".to_string();
        record.independent_variable.name = "FREQ".to_string();
        record.independent_variable.format = "MAG".to_string();
        record.independent_variable.samples = vec![1e9, 2e9];
        let mut array = DataArray::new("S[1,1]", "RI");
        array.samples = vec![(0.1, 0.2), (0.3, 0.4)];
        record.data.push(array);
        record
    }

    #[test]
    fn serializes_in_the_documented_order() {
        let text = serialize(&sample_record()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "CITIFILE A.01.00");
        assert_eq!(lines[1], "NAME DATA");
        assert_eq!(lines[2], "VAR FREQ MAG 2");
        assert_eq!(lines[3], "DATA S[1,1] RI");
        assert_eq!(lines[4], "VAR_LIST_BEGIN");
        assert_eq!(lines[5], "1.0E+9");
        assert_eq!(lines[6], "2.0E+9");
        assert_eq!(lines[7], "VAR_LIST_END");
        assert_eq!(lines[8], "BEGIN");
        assert_eq!(lines[9], "1.0E-1,2.0E-1");
        assert_eq!(lines[10], "3.0E-1,4.0E-1");
        assert_eq!(lines[11], "END");
    }

    #[test]
    fn round_trips_through_parse() {
        let record = sample_record();
        let text = serialize(&record).unwrap();
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, record);
    }

    #[test]
    fn rejects_writing_without_a_name() {
        let mut record = sample_record();
        record.name.clear();
        let err = serialize(&record).unwrap_err();
        assert_eq!(err.code(), -36);
    }

    #[test]
    fn rejects_writing_a_data_array_missing_a_format() {
        let mut record = sample_record();
        record.data[0].format.clear();
        let err = serialize(&record).unwrap_err();
        assert_eq!(err.code(), -38);
    }

    #[test]
    fn rejects_writing_with_no_data_arrays() {
        let mut record = sample_record();
        record.data.clear();
        let err = serialize(&record).unwrap_err();
        assert_eq!(err.code(), -37);
    }

    #[test]
    fn comments_and_device_entries_are_emitted_after_name() {
        let mut record = sample_record();
        record.comments.push("Device: Agilent".to_string());
        record.push_device_entry("NA", "VERSION HP8510B.05.00".to_string());
        let text = serialize(&record).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "NAME DATA");
        assert_eq!(lines[2], "! Device: Agilent");
        assert_eq!(lines[3], "#NA VERSION HP8510B.05.00");
    }
}
