//! Delimited record reader for G-NAF PSV files
//!
//! Files are pipe-delimited with no quoting; an empty field denotes null.
//! The first line of every file is a column-header row and is consumed on
//! open. Known-defective files are repaired by a declared correction list
//! before any row is read.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use gnaf_common::{GnafError, Result};
use tracing::info;

/// Field delimiter used by every G-NAF data file
pub const DELIMITER: char = '|';

/// A textual repair applied to a source file before it is read
///
/// Rules are matched by predicate, not by a hardcoded name in the read path,
/// so a future data release that breaks another file is handled by adding a
/// rule here. Each matching file is corrected independently.
pub struct CorrectionRule {
    /// Short identifier used in logs
    pub name: &'static str,
    /// Whether the rule applies to the given base file name
    pub applies_to: fn(&str) -> bool,
    /// The correction itself
    pub apply: fn(&str) -> String,
}

/// The built-in correction list
///
/// NSW_ADDRESS_SITE ships with lone backslashes that the COPY text format
/// would treat as escape characters, corrupting the row. Doubling them makes
/// them literal.
pub fn builtin_corrections() -> &'static [CorrectionRule] {
    &[CorrectionRule {
        name: "double-backslashes",
        applies_to: |file_name| file_name == "NSW_ADDRESS_SITE_psv.psv",
        apply: |content| content.replace('\\', "\\\\"),
    }]
}

/// Split one data line into fields, mapping empty strings to null
pub fn parse_line(line: &str) -> Vec<Option<String>> {
    line.split(DELIMITER)
        .map(|field| {
            if field.is_empty() {
                None
            } else {
                Some(field.to_string())
            }
        })
        .collect()
}

/// One open PSV file, header already consumed
pub struct PsvFile {
    path: PathBuf,
    header: Vec<String>,
    reader: BufReader<File>,
}

impl PsvFile {
    /// Open a file with the built-in correction list
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_corrections(path, builtin_corrections())
    }

    /// Open a file, applying any matching corrections in place first
    pub fn open_with_corrections(
        path: impl AsRef<Path>,
        corrections: &[CorrectionRule],
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        for rule in corrections {
            if (rule.applies_to)(&file_name) {
                info!(file = %file_name, rule = rule.name, "Applying correction");
                let content = fs::read_to_string(&path)?;
                fs::write(&path, (rule.apply)(&content))?;
            }
        }

        let mut reader = BufReader::new(File::open(&path)?);

        let mut header_line = String::new();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(GnafError::malformed(file_name, "missing header row"));
        }
        let header = trim_newline(&header_line)
            .split(DELIMITER)
            .map(str::to_string)
            .collect();

        Ok(Self {
            path,
            header,
            reader,
        })
    }

    /// Source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names from the header row
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Lazy iterator over the remaining data records
    pub fn records(&mut self) -> Records<'_> {
        Records {
            reader: &mut self.reader,
            line: String::new(),
        }
    }

    /// Consume the file, yielding the raw post-header body for bulk copy
    pub fn into_body(self) -> BufReader<File> {
        self.reader
    }
}

/// Iterator over parsed data records
pub struct Records<'a> {
    reader: &'a mut BufReader<File>,
    line: String,
}

impl Iterator for Records<'_> {
    type Item = Result<Vec<Option<String>>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = trim_newline(&self.line);
                    if line.is_empty() {
                        continue;
                    }
                    return Some(Ok(parse_line(line)));
                },
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

fn trim_newline(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
