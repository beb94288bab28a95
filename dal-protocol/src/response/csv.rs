//! CSV responses.
//!
//! CSV has no error channel. Every line becomes one `csvdata` record: keyed
//! by the headings line when headings are enabled, otherwise a single
//! `csvline` field holding the raw line. Blank or repeated headings are
//! renamed `column-N`.

use super::deliver;
use crate::csv::CsvSplitter;
use crate::envelope::ResponseEnvelope;
use crate::record::{Record, RecordVisitor};
use crate::tags;

/// How a CSV body is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    /// Treat the first line as field names.
    pub use_headings: bool,
    /// Stripped from the start of the headings line when present.
    pub headings_prefix: String,
    pub splitter: CsvSplitter,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            use_headings: false,
            headings_prefix: "#".to_string(),
            splitter: CsvSplitter::default(),
        }
    }
}

impl CsvOptions {
    pub fn with_headings(mut self) -> Self {
        self.use_headings = true;
        self
    }
}

/// Renames blank or repeated headings to `column-N` (1-based position) so
/// no value is lost when a line is keyed by heading.
fn unique_headings(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, heading) in raw.into_iter().enumerate() {
        let mut name = heading;
        if name.is_empty() || out.contains(&name) {
            name = format!("column-{}", i + 1);
            while out.contains(&name) {
                name.push('_');
            }
        }
        out.push(name);
    }
    out
}

#[derive(Debug, Clone)]
pub struct CsvResponse {
    envelope: ResponseEnvelope,
    options: CsvOptions,
    headings: Option<Vec<String>>,
}

impl CsvResponse {
    pub fn new(envelope: ResponseEnvelope, options: CsvOptions) -> Self {
        let headings = if options.use_headings {
            envelope.body.lines().next().map(|line| {
                let line = line
                    .strip_prefix(options.headings_prefix.as_str())
                    .filter(|_| !options.headings_prefix.is_empty())
                    .unwrap_or(line);
                unique_headings(options.splitter.split(line))
            })
        } else {
            None
        };
        Self {
            envelope,
            options,
            headings,
        }
    }

    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Field names from the headings line, if headings are in use.
    pub fn headings(&self) -> Option<&[String]> {
        self.headings.as_deref()
    }

    fn data_lines(&self) -> impl Iterator<Item = &str> {
        let skip = usize::from(self.options.use_headings);
        self.envelope.body.lines().skip(skip)
    }

    fn to_record(&self, line: &str) -> Record {
        let mut record = Record::new(self.envelope.url.clone(), tags::CSV_DATA);
        if line.is_empty() {
            return record;
        }
        match &self.headings {
            Some(headings) => {
                let mut values = self.options.splitter.split(line).into_iter();
                for heading in headings {
                    record
                        .fields
                        .insert(heading.clone(), values.next().unwrap_or_default());
                }
                let extra = values.count();
                if extra > 0 {
                    record.warn(format!(
                        "{} value(s) beyond {} headings dropped",
                        extra,
                        headings.len()
                    ));
                }
            }
            None => {
                record.fields.insert(tags::CSV_LINE.to_string(), line.to_string());
            }
        }
        record
    }

    /// First data record when `tag` is `csvdata`; empty otherwise.
    pub fn first_record(&self, tag: &str) -> Record {
        if tag != tags::CSV_DATA {
            return Record::new(self.envelope.url.clone(), tag);
        }
        self.data_lines()
            .next()
            .map(|line| self.to_record(line))
            .unwrap_or_else(|| Record::new(self.envelope.url.clone(), tag))
    }

    pub fn visit_records(
        &self,
        visitor: &mut dyn RecordVisitor,
        wanted: &[&str],
        include_empty: bool,
    ) -> bool {
        if !wanted.is_empty() && !wanted.contains(&tags::CSV_DATA) {
            return true;
        }
        for line in self.data_lines() {
            let record = self.to_record(line);
            if deliver(visitor, tags::CSV_DATA, &record, include_empty).is_break() {
                return false;
            }
        }
        true
    }
}
