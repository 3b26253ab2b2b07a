//! The binary test-inventory format.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! u32 count
//! per test:
//!   u32 flags            (bit 0 = should_fail; unknown bits preserved)
//!   name  NUL
//!   exe   NUL
//!   arg   NUL  …         (flattened argv)
//!   NUL                  (double NUL closes the arg list)
//!   KEY=VAL NUL …        (flattened environment)
//!   NUL                  (double NUL closes the env list)
//! ```
//!
//! The loader reverses the writer exactly; a serialize→load round trip is
//! byte-faithful.

use std::{
    fmt,
    io::{self, Read, Write},
};

/// Flag bit: the test passes when its process exits non-zero.
pub const TEST_FLAG_SHOULD_FAIL: u32 = 1;

/// One test as stored in the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub flags: u32,
    pub name: String,
    pub exe: String,
    pub args: Vec<String>,
    pub env: Vec<String>,
}

impl TestRecord {
    #[must_use]
    pub fn should_fail(&self) -> bool {
        self.flags & TEST_FLAG_SHOULD_FAIL != 0
    }
}

/// A malformed inventory stream.
#[derive(Debug)]
pub enum LoadError {
    Io(io::Error),
    /// Truncated stream or an unterminated string run.
    Truncated,
    /// A string run held invalid UTF-8.
    Encoding,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read test inventory: {err}"),
            Self::Truncated => f.write_str("truncated test inventory"),
            Self::Encoding => f.write_str("test inventory holds invalid UTF-8"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Writes the whole inventory.
pub fn write_tests(out: &mut impl Write, tests: &[TestRecord]) -> io::Result<()> {
    let count = u32::try_from(tests.len()).expect("test count fits u32");
    out.write_all(&count.to_le_bytes())?;
    for test in tests {
        out.write_all(&test.flags.to_le_bytes())?;
        write_nul_str(out, &test.name)?;
        write_nul_str(out, &test.exe)?;
        for arg in &test.args {
            write_nul_str(out, arg)?;
        }
        out.write_all(&[0])?;
        for entry in &test.env {
            write_nul_str(out, entry)?;
        }
        out.write_all(&[0])?;
    }
    Ok(())
}

fn write_nul_str(out: &mut impl Write, s: &str) -> io::Result<()> {
    out.write_all(s.as_bytes())?;
    out.write_all(&[0])
}

/// Reads the whole inventory back.
pub fn load_tests(input: &mut impl Read) -> Result<Vec<TestRecord>, LoadError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let mut cursor = Cursor { bytes: &bytes, pos: 0 };

    let count = cursor.read_u32()?;
    let mut tests = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let flags = cursor.read_u32()?;
        let name = cursor.read_str()?;
        let exe = cursor.read_str()?;
        let args = cursor.read_list()?;
        let env = cursor.read_list()?;
        tests.push(TestRecord {
            flags,
            name,
            exe,
            args,
            env,
        });
    }
    Ok(tests)
}

struct Cursor<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn read_u32(&mut self) -> Result<u32, LoadError> {
        let end = self.pos + 4;
        let chunk = self.bytes.get(self.pos..end).ok_or(LoadError::Truncated)?;
        self.pos = end;
        Ok(u32::from_le_bytes(chunk.try_into().expect("4-byte slice")))
    }

    fn read_str(&mut self) -> Result<String, LoadError> {
        let rest = self.bytes.get(self.pos..).ok_or(LoadError::Truncated)?;
        let nul = rest.iter().position(|b| *b == 0).ok_or(LoadError::Truncated)?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| LoadError::Encoding)?;
        self.pos += nul + 1;
        Ok(s.to_owned())
    }

    /// Reads NUL-terminated strings until the closing (empty) run.
    fn read_list(&mut self) -> Result<Vec<String>, LoadError> {
        let mut out = Vec::new();
        loop {
            if self.bytes.get(self.pos) == Some(&0) {
                self.pos += 1;
                return Ok(out);
            }
            out.push(self.read_str()?);
        }
    }
}
