//! Minimal rotation-aware file follower: reads whatever is newly appended
//! to a path since the last call, and reopens from the start once the path
//! starts pointing at a different inode (the container runtime rotated the
//! file out from under us).

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

pub struct Follower {
    reader: BufReader<File>,
    ino: u64,
}

impl Follower {
    pub fn open(path: &Path, offset: u64) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let ino = file.metadata()?.ino();
        file.seek(SeekFrom::Start(offset))?;
        Ok(Follower {
            reader: BufReader::new(file),
            ino,
        })
    }

    /// Returns `true` if the path no longer refers to the inode we have
    /// open, i.e. the file was rotated (renamed aside and recreated).
    pub fn was_rotated(&self, path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => meta.ino() != self.ino,
            Err(_) => true,
        }
    }

    pub fn offset(&mut self) -> io::Result<u64> {
        self.reader.stream_position()
    }

    /// Reads every complete line currently available without blocking past
    /// EOF; an incomplete trailing line (not yet newline-terminated) is left
    /// unconsumed for the next call.
    pub fn read_available(&mut self) -> io::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let mut buf = Vec::new();
            let start = self.reader.stream_position()?;
            let read = self.reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            if buf.last() != Some(&b'\n') {
                // Partial line at EOF: rewind so the next call re-reads it
                // once more data has been appended.
                self.reader.seek(SeekFrom::Start(start))?;
                break;
            }
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_lines_written_incrementally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\ntwo\n").unwrap();

        let mut follower = Follower::open(&path, 0).unwrap();
        assert_eq!(follower.read_available().unwrap(), vec!["one", "two"]);
        assert_eq!(follower.read_available().unwrap(), Vec::<String>::new());

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "three\n").unwrap();
        assert_eq!(follower.read_available().unwrap(), vec!["three"]);
    }

    #[test]
    fn leaves_partial_trailing_line_for_next_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\ntwo").unwrap();

        let mut follower = Follower::open(&path, 0).unwrap();
        assert_eq!(follower.read_available().unwrap(), vec!["one"]);

        let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "-more\n").unwrap();
        assert_eq!(follower.read_available().unwrap(), vec!["two-more"]);
    }

    #[test]
    fn detects_rotation_by_inode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "one\n").unwrap();
        let follower = Follower::open(&path, 0).unwrap();
        assert!(!follower.was_rotated(&path));

        std::fs::rename(&path, dir.path().join("a.log.1")).unwrap();
        std::fs::write(&path, "new\n").unwrap();
        assert!(follower.was_rotated(&path));
    }
}
