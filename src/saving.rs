use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use tempfile::NamedTempFile;
use std::io::Write;
use std::path::Path;

use crate::tracker::Tracker;

/// Write every tracker document to `filename` as gzip-compressed bincode.
///
/// The data goes to a temporary file next to `filename` that is renamed over
/// it once complete, so an interrupted save leaves the previous snapshot.
pub fn save_trackers(trackers: &[Tracker], filename: impl AsRef<Path>) -> std::io::Result<()> {
    let path = filename.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent)?;
            parent
        }
        _ => Path::new("."),
    };

    let staged = NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(staged.as_file(), Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);

        serialize_into(&mut writer, trackers)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| e.into_error())?
            .finish()?;
    }
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|e| e.error)?;

    Ok(())
}

pub fn load_trackers(filename: impl AsRef<Path>) -> std::io::Result<Vec<Tracker>> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let trackers: Vec<Tracker> = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(trackers)
}
