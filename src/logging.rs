//! Per-job log file
//!
//! Every run can mirror its log lines into `{directory}/{host}/{job-id}/log.log`.
//! The file is rotated by size: `log.log` becomes `log.log.1`, older files move
//! up by one and the oldest beyond `max_files` is overwritten.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use url::Url;

pub const LOG_FILE_NAME: &str = "log.log";

/// Path of the log file for one job
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use trawl::logging::job_log_path;
/// use url::Url;
///
/// let base = Url::parse("https://shop.example.com/catalog").unwrap();
/// let path = job_log_path(Path::new("logs"), &base, "shop");
/// assert_eq!(path, Path::new("logs/shop.example.com/shop/log.log"));
/// ```
pub fn job_log_path(directory: &Path, base_url: &Url, job_id: &str) -> PathBuf {
    let host = match (base_url.host_str(), base_url.port()) {
        (Some(host), Some(port)) => format!("{}_{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => "unknown-host".to_string(),
    };
    directory.join(host).join(job_id).join(LOG_FILE_NAME)
}

/// An append-only file that rotates once it reaches `max_size` bytes
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    file: File,
    written: u64,
    max_size: u64,
    max_files: u32,
}

impl RotatingFile {
    /// Opens (or creates) `path`, creating parent directories as needed
    pub fn open(path: &Path, max_size: u64, max_files: u32) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = append(path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            written,
            max_size,
            max_files,
        })
    }

    fn backup(&self, n: u32) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files == 0 {
            self.file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&self.path)?;
        } else {
            for n in (1..self.max_files).rev() {
                let from = self.backup(n);
                if from.exists() {
                    fs::rename(&from, self.backup(n + 1))?;
                }
            }
            fs::rename(&self.path, self.backup(1))?;
            self.file = append(&self.path)?;
        }

        self.written = 0;
        Ok(())
    }
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
