//! CSV line splitting.
//!
//! The server's quoting rules are narrower than RFC 4180: a quote character
//! opens a quoted field only as the first character of the field, a doubled
//! quote inside a quoted field yields one quote character, and anything
//! between a closing quote and the next separator is discarded.

/// Default column separator.
pub const DEFAULT_SEPARATOR: char = ',';
/// Default quote character.
pub const DEFAULT_QUOTE: char = '"';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitState {
    LookingForSeparator,
    InQuote,
    LookingForSecondQuote,
}

/// Splits lines into fields with a configurable separator and quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvSplitter {
    separator: char,
    quote: char,
}

impl Default for CsvSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR, DEFAULT_QUOTE)
    }
}

impl CsvSplitter {
    pub fn new(separator: char, quote: char) -> Self {
        Self { separator, quote }
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn quote(&self) -> char {
        self.quote
    }

    /// Splits one line. Empty fields are kept, so the result always has at
    /// least one element.
    pub fn split(&self, line: &str) -> Vec<String> {
        if !line.contains(self.quote) {
            return line.split(self.separator).map(str::to_string).collect();
        }

        let mut fields = Vec::new();
        let mut field = String::new();
        let mut state = SplitState::LookingForSeparator;

        for ch in line.chars() {
            match state {
                SplitState::LookingForSeparator => {
                    if ch == self.separator {
                        fields.push(std::mem::take(&mut field));
                    } else if field.is_empty() && ch == self.quote {
                        state = SplitState::InQuote;
                    } else {
                        field.push(ch);
                    }
                }
                SplitState::InQuote => {
                    if ch == self.quote {
                        state = SplitState::LookingForSecondQuote;
                    } else {
                        field.push(ch);
                    }
                }
                SplitState::LookingForSecondQuote => {
                    if ch == self.quote {
                        field.push(self.quote);
                        state = SplitState::InQuote;
                    } else if ch == self.separator {
                        fields.push(std::mem::take(&mut field));
                        state = SplitState::LookingForSeparator;
                    }
                }
            }
        }
        fields.push(field);

        fields
    }
}

/// Splits a line with the default `,` separator and `"` quote.
pub fn split_csv_line(line: &str) -> Vec<String> {
    CsvSplitter::default().split(line)
}
