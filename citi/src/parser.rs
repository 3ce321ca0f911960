//! The line-oriented recursive-descent parser: a table-driven state machine
//! keyed on `(state, keyword)`, following the Design Note in spec.md §9 —
//! explicit transitions and a small single-use tracker rather than nested
//! control flow, in the spirit of `allegro_cwr`'s `CwrRecord`/`ParseResult`
//! split between "what was read" and "what it means".

use crate::error::{CitiError, Result};
use crate::lexer::{classify, Line};
use crate::numeric::parse_real;
use crate::record::{DataArray, Record};
use log::{debug, trace, warn};

/// Which kind of independent-variable sample block is open, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IvKind {
    VarList,
    SegList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing has been read yet; only `CITIFILE` is acceptable.
    Start,
    /// Reading header keywords, comments, device lines, and `DATA`
    /// declarations, or having just closed an IV/data block.
    Header,
    /// Inside `VAR_LIST_BEGIN`/`VAR_LIST_END` or `SEG_LIST_BEGIN`/`SEG_LIST_END`.
    IvBody(IvKind),
    /// Inside `BEGIN`/`END` for the data array at this index.
    DataBody(usize),
}

#[derive(Default)]
struct SingleUse {
    citifile: bool,
    name: bool,
    var: bool,
    iv_block: bool,
}

struct Parser {
    state: State,
    used: SingleUse,
    record: Record,
    /// Number of data arrays that have been opened with `BEGIN` so far, in
    /// declaration order; the next `BEGIN` opens `data[next_to_open]`.
    next_to_open: usize,
    /// Whether `data[i]` has been through a `BEGIN`/`END` block.
    populated: Vec<bool>,
}

impl Parser {
    fn new() -> Self {
        Parser { state: State::Start, used: SingleUse::default(), record: Record::default(), next_to_open: 0, populated: Vec::new() }
    }

    fn feed_line(&mut self, raw: &str, line_number: usize) -> Result<()> {
        let trimmed = raw.trim_end_matches(['\r', '\n']).trim_end();
        if trimmed.is_empty() {
            return Ok(());
        }

        let line = classify(raw, line_number);
        trace!("line {line_number}: {line:?} (state {:?})", self.state);

        match line {
            Line::Comment(text) => self.on_comment(text, line_number),
            Line::DeviceLine(name, rest) => self.on_device(name, rest, line_number),
            Line::Keyword(word, rest) => self.on_keyword(&word, &rest, line_number),
            Line::NumericSingle(value) => self.on_numeric_single(value, line_number),
            Line::NumericPair(a, b) => self.on_numeric_pair(a, b, line_number),
            Line::Other(text) => self.on_other(&text, line_number),
        }
    }

    /// A line that classified as neither a comment, device line, keyword,
    /// nor a clean numeric value/pair. Inside a block that expects numeric
    /// content this is a malformed number (trailing comma, extra token, or
    /// other garbage) — `-23`, per the tie-break rule for numeric lines.
    /// Anywhere else it's simply a line that doesn't belong there — `-28`.
    fn on_other(&mut self, text: &str, line_number: usize) -> Result<()> {
        match self.state {
            State::IvBody(IvKind::VarList) | State::DataBody(_) => Err(CitiError::BadNumber { line: line_number, token: text.to_string() }),
            _ => Err(CitiError::LineError { line: line_number }),
        }
    }

    fn on_comment(&mut self, text: String, line_number: usize) -> Result<()> {
        match self.state {
            State::Header => {
                self.record.comments.push(text);
                Ok(())
            }
            _ => Err(CitiError::OutOfOrderKeyword { line: line_number, keyword: "COMMENT".to_string() }),
        }
    }

    fn on_device(&mut self, name: String, rest: String, line_number: usize) -> Result<()> {
        match self.state {
            State::Header => {
                self.record.push_device_entry(&name, rest);
                Ok(())
            }
            _ => Err(CitiError::OutOfOrderKeyword { line: line_number, keyword: format!("#{name}") }),
        }
    }

    fn on_keyword(&mut self, word: &str, rest: &str, line_number: usize) -> Result<()> {
        match word {
            "CITIFILE" => self.on_citifile(rest, line_number),
            "NAME" => self.on_name(rest, line_number),
            "VAR" => self.on_var(rest, line_number),
            "DATA" => self.on_data(rest, line_number),
            "VAR_LIST_BEGIN" => self.on_iv_begin(IvKind::VarList, line_number),
            "VAR_LIST_END" => self.on_iv_end(IvKind::VarList, line_number),
            "SEG_LIST_BEGIN" => self.on_iv_begin(IvKind::SegList, line_number),
            "SEG_LIST_END" => self.on_iv_end(IvKind::SegList, line_number),
            "SEG" => self.on_seg(rest, line_number),
            "BEGIN" => self.on_begin(line_number),
            "END" => self.on_end(line_number),
            _ => Err(CitiError::BadKeyword { line: line_number, keyword: word.to_string() }),
        }
    }

    fn on_citifile(&mut self, rest: &str, line_number: usize) -> Result<()> {
        if self.state != State::Start {
            return Err(CitiError::OutOfOrderKeyword { line: line_number, keyword: "CITIFILE".to_string() });
        }
        if self.used.citifile {
            return Err(CitiError::SingleUseKeywordDefinedTwice { line: line_number, keyword: "CITIFILE".to_string() });
        }
        self.used.citifile = true;
        self.record.version = rest.trim().to_string();
        self.state = State::Header;
        debug!("line {line_number}: CITIFILE -> version {:?}", self.record.version);
        Ok(())
    }

    fn on_name(&mut self, rest: &str, line_number: usize) -> Result<()> {
        self.require_header(line_number, "NAME")?;
        if self.used.name {
            return Err(CitiError::SingleUseKeywordDefinedTwice { line: line_number, keyword: "NAME".to_string() });
        }
        self.used.name = true;
        self.record.name = rest.trim().to_string();
        Ok(())
    }

    fn on_var(&mut self, rest: &str, line_number: usize) -> Result<()> {
        self.require_header(line_number, "VAR")?;
        if self.used.var {
            return Err(CitiError::SingleUseKeywordDefinedTwice { line: line_number, keyword: "VAR".to_string() });
        }
        self.used.var = true;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or("").to_string();
        let format = tokens.next().unwrap_or("").to_string();
        // The declared sample count is informational — the parser trusts
        // the samples it actually reads (via VAR_LIST/SEG_LIST) over this
        // count, and cross-checks length against the data arrays instead.
        self.record.independent_variable.name = name;
        self.record.independent_variable.format = format;
        Ok(())
    }

    fn on_data(&mut self, rest: &str, line_number: usize) -> Result<()> {
        self.require_header(line_number, "DATA")?;
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or("").to_string();
        let format = tokens.next().unwrap_or("").to_string();
        self.record.data.push(DataArray::new(name, format));
        self.populated.push(false);
        Ok(())
    }

    fn on_iv_begin(&mut self, kind: IvKind, line_number: usize) -> Result<()> {
        self.require_header(line_number, "VAR_LIST_BEGIN/SEG_LIST_BEGIN")?;
        if self.used.iv_block {
            return Err(CitiError::IndependentVariableDefinedTwice { line: line_number });
        }
        self.used.iv_block = true;
        self.state = State::IvBody(kind);
        Ok(())
    }

    fn on_iv_end(&mut self, kind: IvKind, line_number: usize) -> Result<()> {
        if self.state != State::IvBody(kind) {
            return Err(CitiError::LineError { line: line_number });
        }
        self.state = State::Header;
        Ok(())
    }

    fn on_seg(&mut self, rest: &str, line_number: usize) -> Result<()> {
        if self.state != State::IvBody(IvKind::SegList) {
            return Err(CitiError::BadKeyword { line: line_number, keyword: "SEG".to_string() });
        }
        let mut tokens = rest.split_whitespace();
        let start = tokens.next().ok_or(CitiError::LineError { line: line_number })?;
        let stop = tokens.next().ok_or(CitiError::LineError { line: line_number })?;
        let points = tokens.next().ok_or(CitiError::LineError { line: line_number })?;

        let start = parse_real(start, line_number)?;
        let stop = parse_real(stop, line_number)?;
        let points: usize = points.trim().parse().map_err(|_| CitiError::BadNumber { line: line_number, token: points.to_string() })?;

        expand_segment(start, stop, points, &mut self.record.independent_variable.samples);
        Ok(())
    }

    fn on_begin(&mut self, line_number: usize) -> Result<()> {
        self.require_header(line_number, "BEGIN")?;
        if self.next_to_open >= self.record.data.len() {
            return Err(CitiError::DataArrayOverIndex { line: line_number });
        }
        let index = self.next_to_open;
        self.next_to_open += 1;
        self.state = State::DataBody(index);
        Ok(())
    }

    fn on_end(&mut self, line_number: usize) -> Result<()> {
        match self.state {
            State::DataBody(index) => {
                self.populated[index] = true;
                self.state = State::Header;
                Ok(())
            }
            _ => Err(CitiError::LineError { line: line_number }),
        }
    }

    fn on_numeric_single(&mut self, value: f64, line_number: usize) -> Result<()> {
        match self.state {
            State::IvBody(IvKind::VarList) => {
                self.record.independent_variable.samples.push(value);
                Ok(())
            }
            _ => Err(CitiError::LineError { line: line_number }),
        }
    }

    fn on_numeric_pair(&mut self, a: f64, b: f64, line_number: usize) -> Result<()> {
        match self.state {
            State::DataBody(index) => {
                self.record.data[index].samples.push((a, b));
                Ok(())
            }
            _ => Err(CitiError::LineError { line: line_number }),
        }
    }

    fn require_header(&self, line_number: usize, keyword: &str) -> Result<()> {
        match self.state {
            State::Header => Ok(()),
            _ => Err(CitiError::OutOfOrderKeyword { line: line_number, keyword: keyword.to_string() }),
        }
    }

    fn finish(self) -> Result<Record> {
        if !self.used.citifile {
            return Err(CitiError::MissingVersion);
        }
        if !self.used.name {
            return Err(CitiError::MissingName);
        }
        if !self.used.var {
            return Err(CitiError::MissingIndependentVariable);
        }
        if self.record.data.is_empty() || self.populated.iter().any(|p| !p) {
            return Err(CitiError::MissingDataNameOrFormat);
        }
        self.record.validate_lengths()?;
        Ok(self.record)
    }
}

/// Expand a `(start, stop, points)` segment into explicit samples, appending
/// them to `out`. A single point emits exactly `start`; otherwise the
/// segment is a linear, inclusive sweep from `start` to `stop`.
fn expand_segment(start: f64, stop: f64, points: usize, out: &mut Vec<f64>) {
    if points == 0 {
        return;
    }
    if points == 1 {
        out.push(start);
        return;
    }
    let step = (stop - start) / (points - 1) as f64;
    for i in 0..points {
        out.push(start + step * i as f64);
    }
}

/// Parse a complete CITI document from its textual content.
pub fn parse(input: &str) -> Result<Record> {
    let mut parser = Parser::new();
    for (idx, raw_line) in input.lines().enumerate() {
        let line_number = idx + 1;
        if let Err(err) = parser.feed_line(raw_line, line_number) {
            warn!("parse failed at line {line_number}: {err}");
            return Err(err);
        }
    }
    parser.finish()
}
