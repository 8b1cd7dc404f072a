//! Single-line CSV codec.
//!
//! Works on one line at a time; embedded line breaks are neither produced nor
//! understood.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvFormat {
    pub delimiter: char,
    pub wrapper: char,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            delimiter: ',',
            wrapper: '"',
        }
    }
}

impl CsvFormat {
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }

    /// Splits a line into fields.
    ///
    /// A wrapper toggles quoted mode wherever it appears; inside quoted mode a
    /// doubled wrapper stands for one literal wrapper. An unclosed wrapper
    /// keeps the rest of the line in the last field.
    pub fn parse(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut quoted = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if c == self.wrapper {
                if !quoted {
                    quoted = true;
                } else if chars.peek() == Some(&self.wrapper) {
                    field.push(c);
                    chars.next();
                } else {
                    quoted = false;
                }
            } else if c == self.delimiter && !quoted {
                fields.push(std::mem::take(&mut field));
            } else {
                field.push(c);
            }
        }
        fields.push(field);

        fields
    }

    /// Joins fields into a line, wrapping those that contain the delimiter or
    /// the wrapper.
    pub fn stringify<I>(&self, fields: I) -> String
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let mut line = String::new();
        for (index, field) in fields.into_iter().enumerate() {
            if index > 0 {
                line.push(self.delimiter);
            }

            let field = field.to_string();
            if field.contains(self.delimiter) || field.contains(self.wrapper) {
                line.push(self.wrapper);
                for c in field.chars() {
                    if c == self.wrapper {
                        line.push(c);
                    }
                    line.push(c);
                }
                line.push(self.wrapper);
            } else {
                line.push_str(&field);
            }
        }
        line
    }
}

pub fn parse_line(line: &str) -> Vec<String> {
    CsvFormat::default().parse(line)
}

pub fn stringify_line<I>(fields: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    CsvFormat::default().stringify(fields)
}
