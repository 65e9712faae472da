use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use super::{PoseSink, SinkError};

/// Newline-delimited JSON, flushed per message so a host reading the pipe
/// sees each frame immediately
pub struct LineSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl LineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl LineSink<std::fs::File> {
    /// Append to `path`, creating it if needed.
    pub fn append(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> PoseSink for LineSink<W> {
    fn post(&mut self, message: &str) -> Result<(), SinkError> {
        self.out.write_all(message.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_message_per_line() {
        let mut sink = LineSink::new(Vec::new());
        sink.post("{\"data\":[1]}").unwrap();
        sink.post("{\"data\":[2]}").unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "{\"data\":[1]}\n{\"data\":[2]}\n");
    }

    #[test]
    fn appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.jsonl");
        LineSink::append(&path).unwrap().post("a").unwrap();
        LineSink::append(&path).unwrap().post("b").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}
