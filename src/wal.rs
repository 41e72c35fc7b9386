use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

const MAGIC: &[u8; 4] = b"BWAL";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

/// Booking events are tiny; a frame claiming more than this is a corrupt
/// length prefix, not data.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// Serialize one event into `buf` as `[u32: crc32][u32: len][payload]`.
/// The frame lands whole or not at all — a serialization failure writes
/// nothing.
fn encode_frame(buf: &mut Vec<u8>, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    buf.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Read one frame. `Ok(None)` ends replay: clean end of log, a torn tail
/// from a crash, or a frame that fails the length or checksum test.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<Event>> {
    let mut head = [0u8; 8];
    if !read_exact_or_eof(reader, &mut head)? {
        return Ok(None);
    }
    let (crc_bytes, len_bytes) = head.split_at(4);
    let crc = u32::from_le_bytes(crc_bytes.try_into().expect("split at 4"));
    let len = u32::from_le_bytes(len_bytes.try_into().expect("split at 4")) as usize;
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_exact_or_eof(reader, &mut payload)? {
        return Ok(None);
    }
    if crc32fast::hash(&payload) != crc {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload).ok())
}

/// Append-only journal of booking events.
///
/// The file carries an 8-byte header (`BWAL` magic + format version) so a
/// replay never mistakes a foreign or future-format file for its own, then
/// one crc-checked frame per event. Appends are staged in memory and hit the
/// disk in batches: `stage` buffers frames, `commit` writes them with a
/// single fsync.
pub struct Wal {
    file: File,
    /// Frames staged since the last commit.
    scratch: Vec<u8>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Open (or create) the journal at `path`, writing the header on first
    /// use.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut wal = Self {
            file,
            scratch: Vec::new(),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        };
        if wal.file.metadata()?.len() == 0 {
            wal.file.write_all(MAGIC)?;
            wal.file.write_all(&FORMAT_VERSION.to_le_bytes())?;
            wal.file.sync_data()?;
        }
        Ok(wal)
    }

    /// Stage one event for the next commit. Nothing reaches the disk until
    /// `commit` runs.
    pub fn stage(&mut self, event: &Event) -> io::Result<()> {
        encode_frame(&mut self.scratch, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    /// Write all staged frames and fsync once. The scratch buffer is cleared
    /// even on failure, so a batch whose callers were told it failed cannot
    /// leak into the next one.
    pub fn commit(&mut self) -> io::Result<()> {
        if self.scratch.is_empty() {
            return Ok(());
        }
        let written = self.file.write_all(&self.scratch);
        self.scratch.clear();
        written?;
        self.file.sync_data()
    }

    /// Stage + commit in one step. Tests only; production appends go through
    /// the group-commit writer.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.stage(event)?;
        self.commit()
    }

    /// Replace the journal with `events`: header and frames are built in
    /// memory, synced to a sibling temp file, and renamed over the old log,
    /// so a crash mid-compaction leaves the previous log intact.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let mut buf = Vec::with_capacity(HEADER_LEN + events.len() * 64);
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        for event in events {
            encode_frame(&mut buf, event)?;
        }

        let tmp = self.path.with_extension("compact");
        let mut out = File::create(&tmp)?;
        out.write_all(&buf)?;
        out.sync_data()?;
        fs::rename(&tmp, &self.path)?;

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        self.scratch.clear();
        self.appends_since_compact = 0;
        Ok(())
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replay the journal from disk, returning all intact events. A torn or
    /// corrupt trailing frame ends the replay; everything before it is kept.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_LEN];
        if !read_exact_or_eof(&mut reader, &mut header)? {
            // Shorter than a header — nothing was ever committed
            return Ok(Vec::new());
        }
        let (magic, version_bytes) = header.split_at(4);
        if magic != MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a booking journal",
            ));
        }
        let version = u32::from_le_bytes(version_bytes.try_into().expect("split at 4"));
        if version != FORMAT_VERSION {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported journal format v{version}"),
            ));
        }

        let mut events = Vec::new();
        while let Some(event) = read_frame(&mut reader)? {
            events.push(event);
        }
        Ok(events)
    }
}
