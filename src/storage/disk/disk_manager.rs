use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use log::{debug, info};
use parking_lot::Mutex;

use crate::common::types::{Fd, PageNo, PAGE_SIZE};
use crate::storage::disk::error::DiskManagerError;

/// Descriptors below this value are never issued, mirroring the OS reserving 0-2
const FIRST_FD: Fd = 3;

struct OpenFile {
    path: PathBuf,
    file: File,
    /// Next page number handed out by `allocate_page`
    next_page_no: PageNo,
}

struct FileTable {
    by_fd: HashMap<Fd, OpenFile>,
    by_path: HashMap<PathBuf, Fd>,
    next_fd: Fd,
}

impl FileTable {
    fn get_mut(&mut self, fd: Fd) -> Result<&mut OpenFile, DiskManagerError> {
        self.by_fd.get_mut(&fd).ok_or(DiskManagerError::FileNotOpen(fd))
    }
}

/// DiskManager is responsible for handling the actual disk I/O operations
pub struct DiskManager {
    files: Mutex<FileTable>,
    log_path: PathBuf,
    log_file: Mutex<Option<File>>,
}

impl DiskManager {
    /// Create a DiskManager whose append-only log lives at `log_path`
    pub fn new(log_path: impl AsRef<Path>) -> Self {
        Self {
            files: Mutex::new(FileTable {
                by_fd: HashMap::new(),
                by_path: HashMap::new(),
                next_fd: FIRST_FD,
            }),
            log_path: log_path.as_ref().to_path_buf(),
            log_file: Mutex::new(None),
        }
    }

    /// Write `data` into page `page_no` of the file behind `fd`
    pub fn write_page(&self, fd: Fd, page_no: PageNo, data: &[u8]) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        let open = files.get_mut(fd)?;

        open.file.seek(SeekFrom::Start(Self::page_offset(page_no)))?;
        open.file.write_all(data)?;
        Ok(())
    }

    /// Read page `page_no` into `buf`. Whatever lies past end-of-file is zero-filled,
    /// so a page that was allocated but never written reads back as zeros.
    pub fn read_page(&self, fd: Fd, page_no: PageNo, buf: &mut [u8]) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        let open = files.get_mut(fd)?;

        open.file.seek(SeekFrom::Start(Self::page_offset(page_no)))?;

        let mut filled = 0;
        while filled < buf.len() {
            match open.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    /// Hand out the next page number of `fd`. Numbers are never reused.
    pub fn allocate_page(&self, fd: Fd) -> Result<PageNo, DiskManagerError> {
        let mut files = self.files.lock();
        let open = files.get_mut(fd)?;
        let page_no = open.next_page_no;
        open.next_page_no += 1;
        debug!("allocated page {} in fd {}", page_no, fd);
        Ok(page_no)
    }

    /// Page numbers are not reclaimed
    pub fn deallocate_page(&self, _fd: Fd, _page_no: PageNo) {}

    /// Current value of the allocation counter of `fd`
    pub fn page_count(&self, fd: Fd) -> Result<PageNo, DiskManagerError> {
        let mut files = self.files.lock();
        Ok(files.get_mut(fd)?.next_page_no)
    }

    /// Override the allocation counter, e.g. from a persisted file header
    pub fn set_page_count(&self, fd: Fd, count: PageNo) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        files.get_mut(fd)?.next_page_no = count;
        Ok(())
    }

    pub fn is_file(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().is_dir()
    }

    pub fn create_dir(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    pub fn destroy_dir(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        fs::remove_dir_all(path)?;
        Ok(())
    }

    /// Create an empty file. Fails if something already exists at `path`.
    pub fn create_file(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        let path = path.as_ref();
        if path.exists() {
            return Err(DiskManagerError::FileExists(path.to_path_buf()));
        }
        OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        info!("created file {}", path.display());
        Ok(())
    }

    /// Remove a closed file
    pub fn destroy_file(&self, path: impl AsRef<Path>) -> Result<(), DiskManagerError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DiskManagerError::FileNotFound(path.to_path_buf()));
        }
        if self.files.lock().by_path.contains_key(path) {
            return Err(DiskManagerError::FileNotClosed(path.to_path_buf()));
        }
        fs::remove_file(path)?;
        info!("destroyed file {}", path.display());
        Ok(())
    }

    /// Open `path` for page I/O. Opening an already open path returns its descriptor.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<Fd, DiskManagerError> {
        let path = path.as_ref();
        let mut files = self.files.lock();
        if let Some(&fd) = files.by_path.get(path) {
            return Ok(fd);
        }

        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DiskManagerError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();

        let fd = files.next_fd;
        files.next_fd += 1;
        files.by_path.insert(path.to_path_buf(), fd);
        files.by_fd.insert(fd, OpenFile {
            path: path.to_path_buf(),
            file,
            next_page_no: (size / PAGE_SIZE as u64) as PageNo,
        });
        info!("opened file {} as fd {}", path.display(), fd);
        Ok(fd)
    }

    pub fn close_file(&self, fd: Fd) -> Result<(), DiskManagerError> {
        let mut files = self.files.lock();
        let open = files.by_fd.remove(&fd).ok_or(DiskManagerError::FileNotOpen(fd))?;
        files.by_path.remove(&open.path);
        open.file.sync_all()?;
        info!("closed fd {} ({})", fd, open.path.display());
        Ok(())
    }

    /// Size of the file at `path` in bytes
    pub fn get_file_size(&self, path: impl AsRef<Path>) -> Result<u64, DiskManagerError> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(DiskManagerError::FileNotFound(path.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_file_name(&self, fd: Fd) -> Result<PathBuf, DiskManagerError> {
        let files = self.files.lock();
        files
            .by_fd
            .get(&fd)
            .map(|open| open.path.clone())
            .ok_or(DiskManagerError::FileNotOpen(fd))
    }

    /// Descriptor of `path`, opening the file if needed
    pub fn get_file_fd(&self, path: impl AsRef<Path>) -> Result<Fd, DiskManagerError> {
        if let Some(&fd) = self.files.lock().by_path.get(path.as_ref()) {
            return Ok(fd);
        }
        self.open_file(path)
    }

    /// Append `data` at the end of the log file
    pub fn write_log(&self, data: &[u8]) -> Result<(), DiskManagerError> {
        let mut guard = self.log_file.lock();
        let file = self.log_handle(&mut guard)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        file.sync_data()?;
        Ok(())
    }

    /// Read log bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes read, clamped to what remains in the file,
    /// or `None` when `offset` lies beyond the end of the log.
    pub fn read_log(&self, buf: &mut [u8], offset: u64) -> Result<Option<usize>, DiskManagerError> {
        let mut guard = self.log_file.lock();
        let file = self.log_handle(&mut guard)?;
        let file_size = file.metadata()?.len();
        if offset > file_size {
            return Ok(None);
        }

        let size = buf.len().min((file_size - offset) as usize);
        if size == 0 {
            return Ok(Some(0));
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf[..size])?;
        Ok(Some(size))
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn log_handle<'a>(&self, slot: &'a mut Option<File>) -> Result<&'a mut File, DiskManagerError> {
        let file = match slot.take() {
            Some(file) => file,
            None => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&self.log_path)?,
        };
        Ok(slot.insert(file))
    }

    /// Calculate the offset of a page in the file
    fn page_offset(page_no: PageNo) -> u64 {
        page_no as u64 * PAGE_SIZE as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DiskManager) {
        let dir = TempDir::new().unwrap();
        let disk = DiskManager::new(dir.path().join("test.log"));
        (dir, disk)
    }

    #[test]
    fn test_write_read() {
        let (dir, disk) = setup();
        let path = dir.path().join("data");
        disk.create_file(&path).unwrap();
        let fd = disk.open_file(&path).unwrap();

        disk.write_page(fd, 0, &[1u8; PAGE_SIZE]).unwrap();
        disk.write_page(fd, 1, &[2u8; PAGE_SIZE]).unwrap();

        let mut buf = vec![0u8; PAGE_SIZE];
        disk.read_page(fd, 1, &mut buf).unwrap();
        assert_eq!(buf, vec![2u8; PAGE_SIZE]);
        disk.read_page(fd, 0, &mut buf).unwrap();
        assert_eq!(buf, vec![1u8; PAGE_SIZE]);
    }

    #[test]
    fn test_read_past_eof_is_zero_filled() {
        let (dir, disk) = setup();
        let path = dir.path().join("data");
        disk.create_file(&path).unwrap();
        let fd = disk.open_file(&path).unwrap();

        // Half a page on disk: the tail of the buffer must come back zeroed
        disk.write_page(fd, 0, &[7u8; PAGE_SIZE / 2]).unwrap();
        let mut buf = vec![0xFFu8; PAGE_SIZE];
        disk.read_page(fd, 0, &mut buf).unwrap();
        assert!(buf[..PAGE_SIZE / 2].iter().all(|&b| b == 7));
        assert!(buf[PAGE_SIZE / 2..].iter().all(|&b| b == 0));

        let mut buf = vec![0xFFu8; PAGE_SIZE];
        disk.read_page(fd, 5, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_allocate_page_seeded_from_file_size() {
        let (dir, disk) = setup();
        let path = dir.path().join("data");
        disk.create_file(&path).unwrap();
        let fd = disk.open_file(&path).unwrap();
        disk.write_page(fd, 2, &[0u8; PAGE_SIZE]).unwrap();
        disk.close_file(fd).unwrap();

        let fd = disk.open_file(&path).unwrap();
        assert_eq!(disk.allocate_page(fd).unwrap(), 3);
        assert_eq!(disk.allocate_page(fd).unwrap(), 4);
        assert_eq!(disk.page_count(fd).unwrap(), 5);
    }

    #[test]
    fn test_file_lifecycle_rules() {
        let (dir, disk) = setup();
        let path = dir.path().join("data");

        assert!(matches!(disk.open_file(&path), Err(DiskManagerError::FileNotFound(_))));
        assert!(matches!(disk.destroy_file(&path), Err(DiskManagerError::FileNotFound(_))));

        disk.create_file(&path).unwrap();
        assert!(matches!(disk.create_file(&path), Err(DiskManagerError::FileExists(_))));

        let fd = disk.open_file(&path).unwrap();
        assert_eq!(disk.open_file(&path).unwrap(), fd);
        assert_eq!(disk.get_file_fd(&path).unwrap(), fd);
        assert_eq!(disk.get_file_name(fd).unwrap(), path);
        assert!(matches!(disk.destroy_file(&path), Err(DiskManagerError::FileNotClosed(_))));

        disk.close_file(fd).unwrap();
        assert!(matches!(disk.close_file(fd), Err(DiskManagerError::FileNotOpen(_))));
        assert!(matches!(disk.allocate_page(fd), Err(DiskManagerError::FileNotOpen(_))));

        disk.destroy_file(&path).unwrap();
        assert!(!disk.is_file(&path));
    }

    #[test]
    fn test_dirs_and_file_size() {
        let (dir, disk) = setup();
        let sub = dir.path().join("nested").join("data");
        assert!(!disk.is_dir(&sub));
        disk.create_dir(&sub).unwrap();
        assert!(disk.is_dir(&sub));

        let path = sub.join("table");
        assert!(matches!(disk.get_file_size(&path), Err(DiskManagerError::FileNotFound(_))));
        disk.create_file(&path).unwrap();
        assert_eq!(disk.get_file_size(&path).unwrap(), 0);

        let fd = disk.open_file(&path).unwrap();
        disk.write_page(fd, 1, &[3u8; PAGE_SIZE]).unwrap();
        disk.close_file(fd).unwrap();
        assert_eq!(disk.get_file_size(&path).unwrap(), 2 * PAGE_SIZE as u64);

        disk.destroy_dir(dir.path().join("nested")).unwrap();
        assert!(!disk.is_dir(&sub));
        assert!(!disk.is_file(&path));
    }

    #[test]
    fn test_log_append_and_read() {
        let (_dir, disk) = setup();
        disk.write_log(b"hello ").unwrap();
        disk.write_log(b"world").unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(disk.read_log(&mut buf, 0).unwrap(), Some(11));
        assert_eq!(&buf[..11], b"hello world");

        assert_eq!(disk.read_log(&mut buf[..3], 6).unwrap(), Some(3));
        assert_eq!(&buf[..3], b"wor");

        assert_eq!(disk.read_log(&mut buf, 11).unwrap(), Some(0));
        assert_eq!(disk.read_log(&mut buf, 12).unwrap(), None);
    }
}
