use camino::Utf8PathBuf;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};

use crate::error::Result;

/// A source that can be either a file or stdin.
#[derive(Default, Clone, Debug)]
pub enum FileOrStdin {
    /// Input from a file.
    File(Utf8PathBuf),
    /// Input from stdin.
    #[default]
    Stdin,
}

impl fmt::Display for FileOrStdin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOrStdin::File(path) => write!(f, "{}", path),
            FileOrStdin::Stdin => write!(f, "<stdin>"),
        }
    }
}

impl FileOrStdin {
    /// Create a new FileOrStdin from a path.
    ///
    /// If the path is "-", stdin is used.
    pub fn from_path(path: Utf8PathBuf) -> Self {
        if path.as_str() == "-" {
            FileOrStdin::Stdin
        } else {
            FileOrStdin::File(path)
        }
    }

    /// Open the input source as a reader.
    pub fn reader(&self) -> Result<InputReader> {
        match self {
            FileOrStdin::File(path) => Ok(InputReader::File(BufReader::new(File::open(path)?))),
            FileOrStdin::Stdin => Ok(InputReader::Stdin(BufReader::new(io::stdin()))),
        }
    }
}

/// A reader for input from either a file or stdin.
pub enum InputReader {
    /// A reader for a file.
    File(BufReader<File>),
    /// A reader for stdin.
    Stdin(BufReader<io::Stdin>),
}

impl InputReader {
    /// Process each line of the input, without its line terminator.
    ///
    /// The provided function is called for each line. If it returns `Ok(true)`,
    /// processing continues. If it returns `Ok(false)`, processing stops.
    /// If it returns an error, processing stops and the error is returned.
    pub fn for_byte_line<F, E>(&mut self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&[u8]) -> std::result::Result<bool, E>,
        E: From<io::Error>,
    {
        let mut buf = Vec::with_capacity(1024);
        loop {
            buf.clear();
            let n = match self {
                InputReader::File(ref mut rdr) => rdr.read_until(b'\n', &mut buf)?,
                InputReader::Stdin(ref mut rdr) => rdr.read_until(b'\n', &mut buf)?,
            };
            if n == 0 {
                break;
            }
            if !f(trim_line_terminator(&buf))? {
                break;
            }
        }
        Ok(())
    }
}

#[inline]
fn trim_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
