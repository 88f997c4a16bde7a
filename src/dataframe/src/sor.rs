// Copyright 2022 eau2 authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Reader for "schema on read" text files: one row per line, fields in
//! angle brackets, `<>` for missing. The schema is inferred from the
//! first window of lines by widening bool -> int -> float -> string;
//! a field that does not fit its column reads as missing, but a
//! structurally broken line (an unterminated field) is a parse error.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use eau2_common::array::Row;
use eau2_common::types::{ColumnType, Datum, Scalar};

use crate::error::{DataFrameError, DataFrameResult};
use crate::visitor::Writer;

/// Lines inspected for schema inference.
const INFER_WINDOW: usize = 500;

/// Widening order of the inferred types.
fn rank(ty: ColumnType) -> u8 {
    match ty {
        ColumnType::Bool => 0,
        ColumnType::Int => 1,
        ColumnType::Float => 2,
        ColumnType::Str => 3,
    }
}

fn widen(a: ColumnType, b: ColumnType) -> ColumnType {
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// The narrowest type a raw field can hold.
fn field_type(raw: &str) -> ColumnType {
    if raw == "0" || raw == "1" {
        return ColumnType::Bool;
    }
    if raw.parse::<i32>().is_ok() {
        return ColumnType::Int;
    }
    if raw.parse::<f32>().is_ok() {
        return ColumnType::Float;
    }
    ColumnType::Str
}

/// Splits one line into its bracketed fields; `None` for `<>`. Quoted
/// strings may contain brackets and spaces. A field with no closing
/// bracket is malformed input.
fn split_fields(line: &str, line_no: usize) -> DataFrameResult<Vec<Option<String>>> {
    let mut fields = Vec::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c != '<' {
            continue;
        }
        let mut field = String::new();
        let mut quoted = false;
        let mut closed = false;
        for c in chars.by_ref() {
            match c {
                '"' => {
                    quoted = !quoted;
                    field.push(c);
                }
                '>' if !quoted => {
                    closed = true;
                    break;
                }
                _ => field.push(c),
            }
        }
        if !closed {
            return Err(DataFrameError::Parse {
                line: line_no,
                reason: "unterminated field".to_owned(),
            });
        }
        let trimmed = field.trim();
        if trimmed.is_empty() {
            fields.push(None);
        } else {
            fields.push(Some(trimmed.trim_matches('"').to_owned()));
        }
    }
    Ok(fields)
}

fn to_datum(raw: Option<&String>, ty: ColumnType) -> Datum {
    let raw = raw?;
    match ty {
        ColumnType::Bool => match raw.as_str() {
            "1" => Some(Scalar::Bool(true)),
            "0" => Some(Scalar::Bool(false)),
            _ => None,
        },
        ColumnType::Int => raw.parse().ok().map(Scalar::Int),
        ColumnType::Float => raw.parse().ok().map(Scalar::Float),
        ColumnType::Str => Some(Scalar::Str(raw.clone())),
    }
}

/// A [`Writer`] over an SoR file, one row per line.
#[derive(Debug)]
pub struct SorReader {
    types: Vec<ColumnType>,
    /// Lines consumed by inference, replayed before the rest of the
    /// file.
    replay: VecDeque<Vec<Option<String>>>,
    lines: Lines<BufReader<File>>,
    /// One-row lookahead so `done` can answer without consuming.
    next: Option<Vec<Option<String>>>,
    /// Lines read from the file so far, for error reporting.
    line_no: usize,
    /// A mid-stream fault. `visit` cannot return it, so it ends the
    /// stream and is surfaced through [`SorReader::take_error`].
    failed: Option<DataFrameError>,
}

impl SorReader {
    pub fn open(path: impl AsRef<Path>) -> DataFrameResult<Self> {
        let mut lines = BufReader::new(File::open(path)?).lines();

        let mut replay = VecDeque::new();
        let mut line_no = 0usize;
        let mut widths = 0usize;
        let mut types: Vec<ColumnType> = Vec::new();
        while replay.len() < INFER_WINDOW {
            let Some(line) = lines.next() else { break };
            line_no += 1;
            let fields = split_fields(&line?, line_no)?;
            widths = widths.max(fields.len());
            for (col, field) in fields.iter().enumerate() {
                let Some(raw) = field else { continue };
                if col >= types.len() {
                    types.resize(col + 1, ColumnType::Bool);
                }
                types[col] = widen(types[col], field_type(raw));
            }
            replay.push_back(fields);
        }
        // Columns seen only as missing default to the narrowest type.
        types.resize(widths, ColumnType::Bool);

        let mut reader = Self {
            types,
            replay,
            lines,
            next: None,
            line_no,
            failed: None,
        };
        reader.advance()?;
        Ok(reader)
    }

    pub fn types(&self) -> &[ColumnType] {
        &self.types
    }

    /// The inferred schema as a tag string, e.g. `"SIF"`.
    pub fn types_string(&self) -> String {
        self.types.iter().map(|ty| ty.tag() as char).collect()
    }

    /// The fault that ended the stream early, if any. Callers that
    /// drove this reader to exhaustion check it before trusting the
    /// result.
    pub fn take_error(&mut self) -> DataFrameResult<()> {
        match self.failed.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn advance(&mut self) -> DataFrameResult<()> {
        if let Some(fields) = self.replay.pop_front() {
            self.next = Some(fields);
            return Ok(());
        }
        self.next = match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                Some(split_fields(&line?, self.line_no)?)
            }
            None => None,
        };
        Ok(())
    }
}

impl Writer for SorReader {
    fn visit(&mut self, row: &mut Row) {
        let fields = self.next.take().expect("visit called after done");
        for (col, ty) in self.types.iter().enumerate() {
            row.set_datum(col, to_datum(fields.get(col).and_then(|f| f.as_ref()), *ty));
        }
        if let Err(err) = self.advance() {
            // The stream ends here; the caller sees the fault through
            // take_error once the drive loop finishes.
            self.failed = Some(err);
            self.next = None;
        }
    }

    fn done(&mut self) -> bool {
        self.next.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use eau2_common::array::Schema;

    use super::*;

    fn reader_over(contents: &str) -> SorReader {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        SorReader::open(file.path()).unwrap()
    }

    #[test]
    fn test_schema_inference_widens() {
        let reader = reader_over("<1> <2> <hello>\n<0> <2.5> <world>\n");
        assert_eq!(reader.types_string(), "BFS");
    }

    #[test]
    fn test_missing_only_column_defaults_bool() {
        let reader = reader_over("<1> <>\n<0> <>\n");
        assert_eq!(reader.types_string(), "BB");
    }

    #[test]
    fn test_rows_round_trip() {
        let mut reader = reader_over("<12> <\"a b\">\n<> <plain>\n");
        assert_eq!(reader.types_string(), "IS");

        let schema = Schema::from_types(&reader.types_string());
        let mut row = Row::new(&schema);

        assert!(!reader.done());
        reader.visit(&mut row);
        assert_eq!(row.get_int(0), 12);
        assert_eq!(row.get_str(1), "a b");

        assert!(!reader.done());
        reader.visit(&mut row);
        assert!(row.is_missing(0));
        assert_eq!(row.get_str(1), "plain");

        assert!(reader.done());
    }

    #[test]
    fn test_mismatched_field_reads_missing() {
        let mut reader = reader_over("<1>\n<2>\n<oops>\n");
        // Widened to string by the third line.
        assert_eq!(reader.types_string(), "S");
        let schema = Schema::from_types("S");
        let mut row = Row::new(&schema);
        reader.visit(&mut row);
        assert_eq!(row.get_str(0), "1");

        let mut reader = reader_over("<3> <1>\n<4> <x>\n");
        assert_eq!(reader.types_string(), "IS");
        let mut row = Row::new(&Schema::from_types("IS"));
        reader.visit(&mut row);
        reader.visit(&mut row);
        assert_eq!(row.get_int(0), 4);
        assert_eq!(row.get_str(1), "x");
    }

    #[test]
    fn test_empty_file() {
        let reader = reader_over("");
        assert_eq!(reader.types_string(), "");
        let mut reader = reader;
        assert!(reader.done());
    }

    #[test]
    fn test_unterminated_field_in_window_fails_open() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<1> <2\n").unwrap();
        let err = SorReader::open(file.path()).unwrap_err();
        assert!(matches!(err, DataFrameError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_unterminated_field_past_window_ends_stream_with_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..INFER_WINDOW {
            writeln!(file, "<{}>", i).unwrap();
        }
        writeln!(file, "<good>").unwrap();
        writeln!(file, "<broken").unwrap();
        writeln!(file, "<never reached>").unwrap();

        let mut reader = SorReader::open(file.path()).unwrap();
        let schema = Schema::from_types(&reader.types_string());
        let mut row = Row::new(&schema);
        let mut rows = 0;
        while !reader.done() {
            reader.visit(&mut row);
            rows += 1;
        }
        // The window plus the one good trailing line; the broken line
        // ends the stream.
        assert_eq!(rows, INFER_WINDOW + 1);
        let err = reader.take_error().unwrap_err();
        assert!(matches!(
            err,
            DataFrameError::Parse { line, .. } if line == INFER_WINDOW + 2
        ));
    }
}
