//! Zip container that grows one entry at a time.
//!
//! Every append is finalized on disk (central directory rewritten) so the
//! file length is the real archive size at each step. Removing an entry
//! rewrites the archive with raw copies of the remaining entries.
use crate::signals;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const COPY_BUF_BYTES: usize = 64 * 1024;

/// Result of adding one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    Added,
    /// An entry with the same name is already present; nothing was written.
    Duplicate,
    /// The source could not be opened or read; the archive is unchanged.
    Unreadable(String),
}

/// An on-disk zip archive plus the ordered list of entry names it holds.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    entries: Vec<String>,
    names: HashSet<String>,
}

impl Archive {
    /// Create an empty archive at `path`, replacing any existing file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut writer = ZipWriter::new(file);
        writer
            .finish()
            .with_context(|| format!("finalize {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            names: HashSet::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entry names in the order they were added.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Current on-disk size in bytes.
    pub fn size(&self) -> Result<u64> {
        let meta =
            fs::metadata(&self.path).with_context(|| format!("stat {}", self.path.display()))?;
        Ok(meta.len())
    }

    /// Append `source` as entry `name` and finalize the archive.
    ///
    /// Source failures are reported through the outcome; errors are reserved
    /// for failures writing the archive itself.
    pub fn append(&mut self, source: &Path, name: &str) -> Result<AppendOutcome> {
        if self.contains(name) {
            return Ok(AppendOutcome::Duplicate);
        }
        let mut input = match File::open(source) {
            Ok(input) => input,
            Err(err) => return Ok(AppendOutcome::Unreadable(err.to_string())),
        };
        let source_len = input.metadata().map(|meta| meta.len()).unwrap_or(0);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .with_context(|| format!("open {}", self.path.display()))?;
        let mut writer = ZipWriter::new_append(file)
            .with_context(|| format!("reopen {} for append", self.path.display()))?;
        writer
            .start_file(name, entry_options(source_len))
            .with_context(|| format!("start entry {name}"))?;
        let copied = copy_entry(&mut input, &mut writer)
            .with_context(|| format!("write entry {name}"))?;
        let file = writer
            .finish()
            .with_context(|| format!("finalize {}", self.path.display()))?;
        trim_to_position(file).with_context(|| format!("trim {}", self.path.display()))?;
        self.entries.push(name.to_string());
        self.names.insert(name.to_string());

        match copied {
            Ok(_) => Ok(AppendOutcome::Added),
            Err(err) => {
                self.remove(name)?;
                Ok(AppendOutcome::Unreadable(err.to_string()))
            }
        }
    }

    /// Remove entry `name` by rewriting the archive without it.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .and_then(|file| file.to_str())
            .unwrap_or("archive");
        let tmp_path = self.path.with_file_name(format!(".{file_name}.tmp"));
        {
            let source =
                File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
            let mut reader = ZipArchive::new(source)
                .with_context(|| format!("read {}", self.path.display()))?;
            let out = File::create(&tmp_path)
                .with_context(|| format!("create {}", tmp_path.display()))?;
            let mut writer = ZipWriter::new(out);
            for idx in 0..reader.len() {
                let entry = reader
                    .by_index_raw(idx)
                    .with_context(|| format!("read entry {idx} of {}", self.path.display()))?;
                if entry.name() == name {
                    continue;
                }
                writer
                    .raw_copy_file(entry)
                    .with_context(|| format!("copy entry {idx} of {}", self.path.display()))?;
            }
            writer
                .finish()
                .with_context(|| format!("finalize {}", tmp_path.display()))?;
        }
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        self.entries.retain(|entry| entry != name);
        self.names.remove(name);
        Ok(())
    }
}

/// Entry names stored in an archive file, in central directory order.
#[cfg(test)]
pub(crate) fn read_entry_names(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = ZipArchive::new(file).with_context(|| format!("read {}", path.display()))?;
    let mut names = Vec::with_capacity(reader.len());
    for idx in 0..reader.len() {
        let entry = reader
            .by_index_raw(idx)
            .with_context(|| format!("read entry {idx} of {}", path.display()))?;
        names.push(entry.name().to_string());
    }
    Ok(names)
}

fn entry_options(source_len: u64) -> FileOptions {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644)
        .large_file(source_len >= u64::from(u32::MAX))
}

/// Copy `input` into the current entry.
///
/// The outer error is a write failure on the archive or a pending termination
/// signal; the inner one is a read failure on the source, which leaves a
/// partial entry for the caller to drop.
fn copy_entry<R: Read, W: Write>(input: &mut R, out: &mut W) -> Result<io::Result<u64>> {
    let mut buf = vec![0u8; COPY_BUF_BYTES];
    let mut total = 0u64;
    loop {
        signals::check()?;
        let read = match input.read(&mut buf) {
            Ok(0) => return Ok(Ok(total)),
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Ok(Err(err)),
        };
        out.write_all(&buf[..read])?;
        total += read as u64;
    }
}

fn trim_to_position(mut file: File) -> io::Result<()> {
    let end = file.stream_position()?;
    file.set_len(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, bytes).expect("write file");
    }

    fn read_entry(path: &Path, name: &str) -> String {
        let file = File::open(path).expect("open archive");
        let mut reader = ZipArchive::new(file).expect("read archive");
        let mut entry = reader.by_name(name).expect("entry present");
        let mut text = String::new();
        entry.read_to_string(&mut text).expect("read entry");
        text
    }

    #[test]
    fn append_grows_archive_and_preserves_order() {
        let dir = tempfile::tempdir().expect("temp dir");
        let zip_path = dir.path().join("out.zip");
        write_file(&dir.path().join("a.txt"), b"alpha");
        write_file(&dir.path().join("b.txt"), b"bravo");

        let mut archive = Archive::create(&zip_path).expect("create archive");
        let empty = archive.size().expect("size");
        assert_eq!(
            archive.append(&dir.path().join("a.txt"), "a.txt").expect("append a"),
            AppendOutcome::Added
        );
        let after_a = archive.size().expect("size");
        assert!(after_a > empty);
        archive
            .append(&dir.path().join("b.txt"), "nested/b.txt")
            .expect("append b");
        assert!(archive.size().expect("size") > after_a);

        assert_eq!(archive.entries(), ["a.txt", "nested/b.txt"]);
        assert_eq!(
            read_entry_names(&zip_path).expect("read names"),
            vec!["a.txt".to_string(), "nested/b.txt".to_string()]
        );
        assert_eq!(read_entry(&zip_path, "nested/b.txt"), "bravo");
    }

    #[test]
    fn remove_drops_last_entry_and_shrinks_archive() {
        let dir = tempfile::tempdir().expect("temp dir");
        let zip_path = dir.path().join("out.zip");
        write_file(&dir.path().join("a.txt"), b"alpha");
        write_file(&dir.path().join("b.txt"), &[b'z'; 8192]);

        let mut archive = Archive::create(&zip_path).expect("create archive");
        archive.append(&dir.path().join("a.txt"), "a.txt").expect("append a");
        archive.append(&dir.path().join("b.txt"), "b.txt").expect("append b");
        let with_b = archive.size().expect("size");
        archive.remove("b.txt").expect("remove b");

        assert_eq!(archive.entries(), ["a.txt"]);
        assert_eq!(read_entry_names(&zip_path).expect("names"), vec!["a.txt"]);
        assert!(archive.size().expect("size") < with_b);
        assert_eq!(read_entry(&zip_path, "a.txt"), "alpha");
        assert!(!dir.path().join(".out.zip.tmp").exists());
    }

    #[test]
    fn missing_source_is_unreadable_and_leaves_archive_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let zip_path = dir.path().join("out.zip");
        let mut archive = Archive::create(&zip_path).expect("create archive");
        let before = archive.size().expect("size");

        let outcome = archive
            .append(&dir.path().join("missing.txt"), "missing.txt")
            .expect("append missing");
        assert!(matches!(outcome, AppendOutcome::Unreadable(_)));
        assert!(archive.entries().is_empty());
        assert_eq!(archive.size().expect("size"), before);
    }

    #[test]
    fn duplicate_names_are_not_written_twice() {
        let dir = tempfile::tempdir().expect("temp dir");
        let zip_path = dir.path().join("out.zip");
        write_file(&dir.path().join("a.txt"), b"alpha");
        let mut archive = Archive::create(&zip_path).expect("create archive");
        archive.append(&dir.path().join("a.txt"), "a.txt").expect("append");
        let size = archive.size().expect("size");

        let outcome = archive.append(&dir.path().join("a.txt"), "a.txt").expect("append again");
        assert_eq!(outcome, AppendOutcome::Duplicate);
        assert_eq!(archive.size().expect("size"), size);
        assert_eq!(read_entry_names(&zip_path).expect("names"), vec!["a.txt"]);
    }

    #[test]
    fn removed_name_can_be_added_again() {
        let dir = tempfile::tempdir().expect("temp dir");
        let zip_path = dir.path().join("out.zip");
        write_file(&dir.path().join("a.txt"), b"alpha");
        let mut archive = Archive::create(&zip_path).expect("create archive");
        archive.append(&dir.path().join("a.txt"), "a.txt").expect("append");
        assert!(archive.contains("a.txt"));

        archive.remove("a.txt").expect("remove");
        assert!(!archive.contains("a.txt"));
        assert_eq!(
            archive.append(&dir.path().join("a.txt"), "a.txt").expect("append again"),
            AppendOutcome::Added
        );
        assert_eq!(archive.entries(), ["a.txt"]);
        assert_eq!(read_entry_names(&zip_path).expect("names"), vec!["a.txt"]);
    }

    #[test]
    fn copy_entry_separates_read_failures() {
        struct FailingReader;
        impl Read for FailingReader {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device went away"))
            }
        }
        let mut out = Vec::new();
        let result = copy_entry(&mut FailingReader, &mut out).expect("no write failure");
        assert!(result.is_err());

        let mut ok_out = Vec::new();
        let copied = copy_entry(&mut &b"hello"[..], &mut ok_out)
            .expect("no write failure")
            .expect("no read failure");
        assert_eq!(copied, 5);
        assert_eq!(ok_out, b"hello");
    }
}
