use std::path::Path;

pub const CHECK_POINT_FILE_NAME: &str = "checkpoint";

/// The last successfully-written source-file position for a chunk.
/// Persisted as two ASCII lines: `{file_num}\n{offset}`.
///
/// Writes are full-file replacements of well under a disk sector, so a torn
/// write during a crash is tolerated rather than treated as corruption:
/// `from_file` falls back to `CheckPoint{file_num: -1, offset: 0}` whenever
/// either line is missing or unparseable, instead of surfacing an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckPoint {
    pub file_num: i64,
    pub offset: i64,
}

impl CheckPoint {
    pub fn new(file_num: i64, offset: i64) -> Self {
        CheckPoint { file_num, offset }
    }

    pub fn from_file(block_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = block_dir.as_ref().join(CHECK_POINT_FILE_NAME);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CheckPoint::new(-1, 0));
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&bytes);
        let mut lines = text.split('\n');
        let file_num = lines.next().and_then(|s| s.parse::<i64>().ok());
        let offset = lines.next().and_then(|s| s.parse::<i64>().ok());

        match (file_num, offset) {
            (Some(file_num), Some(offset)) => Ok(CheckPoint::new(file_num, offset)),
            _ => {
                tracing::warn!(path = %path.display(), "invalid checkpoint contents, resetting");
                Ok(CheckPoint::new(-1, 0))
            }
        }
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    pub fn reset(&mut self, file_num: i64) {
        self.file_num = file_num;
        self.offset = 0;
    }

    pub fn to_bytes(self) -> Vec<u8> {
        format!("{}\n{}", self.file_num, self.offset).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let cp = CheckPoint::new(3, 128);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CHECK_POINT_FILE_NAME), cp.to_bytes()).unwrap();
        let loaded = CheckPoint::from_file(dir.path()).unwrap();
        assert_eq!(loaded, cp);
    }

    #[test]
    fn missing_file_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CheckPoint::from_file(dir.path()).unwrap();
        assert_eq!(loaded, CheckPoint::new(-1, 0));
    }

    #[test]
    fn torn_write_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CHECK_POINT_FILE_NAME), b"4\n").unwrap();
        let loaded = CheckPoint::from_file(dir.path()).unwrap();
        assert_eq!(loaded, CheckPoint::new(-1, 0));
    }
}
