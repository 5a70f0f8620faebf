use serde::de::DeserializeOwned;
use std::{
    fs::{self, File, ReadDir},
    io::{BufReader, BufWriter},
    os::fd::OwnedFd,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

pub mod error {
    use std::{io, path::PathBuf};

    pub type Result<T> = std::result::Result<T, self::Error>;

    type Msg = &'static str;

    #[derive(Debug, thiserror::Error)]
    pub enum Error {
        #[error("{0} ({1}): {2}")]
        SingleIO(Msg, PathBuf, #[source] io::Error),

        #[error("Cannot create FIFO '{0}': {1}")]
        Fifo(PathBuf, #[source] nix::Error),

        #[error("Cannot create pipe: {0}")]
        Pipe(#[source] nix::Error),

        #[error("Cannot create scratch dir: {0}")]
        ScratchDir(#[source] io::Error),

        #[error("Cannot deserialize from TOML (src='{0}'): {1}")]
        DeserializeFromToml(PathBuf, #[source] toml::de::Error),
    }
}
pub use error::{Error, Result};

#[must_use]
pub fn mkdir_all(path: impl AsRef<Path>) -> Result<()> {
    let dir = path.as_ref();
    fs::create_dir_all(dir).map_err(|e| Error::SingleIO("Cannot create dir", dir.to_owned(), e))
}

#[must_use]
pub fn write<P, C>(filepath: P, contents: C) -> Result<()>
where
    P: AsRef<Path>,
    C: AsRef<[u8]>,
{
    fs::write(&filepath, contents)
        .map_err(|e| Error::SingleIO("Cannot write file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_to_string(filepath: impl AsRef<Path>) -> Result<String> {
    fs::read_to_string(&filepath)
        .map_err(|e| Error::SingleIO("Cannot read file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn open_file(filepath: impl AsRef<Path>) -> Result<File> {
    File::open(&filepath)
        .map_err(|e| Error::SingleIO("Cannot open file", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn open_buffered(filepath: impl AsRef<Path>) -> Result<BufReader<File>> {
    self::open_file(filepath).map(BufReader::new)
}

#[must_use]
pub fn create_file(filepath: impl AsRef<Path>) -> Result<File> {
    File::create(&filepath)
        .map_err(|e| Error::SingleIO("Cannot create file", filepath.as_ref().to_owned(), e))
}

/// Opens an existing file (or FIFO) for writing without truncating it.
#[must_use]
pub fn open_for_write(filepath: impl AsRef<Path>) -> Result<BufWriter<File>> {
    fs::OpenOptions::new()
        .write(true)
        .open(&filepath)
        .map(BufWriter::new)
        .map_err(|e| Error::SingleIO("Cannot open file for writing", filepath.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_dir(dir: impl AsRef<Path>) -> Result<ReadDir> {
    fs::read_dir(&dir).map_err(|e| Error::SingleIO("Cannot read dir", dir.as_ref().to_owned(), e))
}

#[must_use]
pub fn read_toml<P, T>(filepath: P) -> Result<T>
where
    P: AsRef<Path>,
    T: DeserializeOwned,
{
    let filepath = filepath.as_ref();
    let s = self::read_to_string(filepath)?;
    toml::from_str(&s).map_err(|e| Error::DeserializeFromToml(filepath.to_owned(), e))
}

/// A fresh directory that is removed with everything in it when dropped.
#[must_use]
pub fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(Error::ScratchDir)
}

/// Creates a named pipe readable and writable by the owner only.
#[must_use]
#[cfg(unix)]
pub fn create_fifo(path: impl AsRef<Path>) -> Result<PathBuf> {
    use nix::{sys::stat::Mode, unistd::mkfifo};
    let path = path.as_ref();
    mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR).map_err(|e| Error::Fifo(path.to_owned(), e))?;
    log::trace!("Created FIFO {}", path.display());
    Ok(path.to_owned())
}

/// An anonymous pipe as `(read_end, write_end)`. Both ends are close-on-exec,
/// so a child only sees the end it is explicitly handed.
#[must_use]
#[cfg(any(target_os = "linux", target_os = "android", target_os = "freebsd"))]
pub fn pipe() -> Result<(OwnedFd, OwnedFd)> {
    use nix::{fcntl::OFlag, unistd::pipe2};
    pipe2(OFlag::O_CLOEXEC).map_err(Error::Pipe)
}
