use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use podfs_store::ObjectStore;
use tracing::trace;

use crate::error::FileError;
use crate::metadata::{FileBlock, FileInode, FileMetadata};

/// Lazy reader over a stored file.
///
/// Blocks are fetched only when a read reaches them; the block holding
/// `offset` is `offset / block_size`. One block is kept in memory at a time.
pub struct FileReader {
    store: Arc<dyn ObjectStore>,
    blocks: Vec<FileBlock>,
    block_size: u64,
    size: u64,
    position: u64,
    current: Option<(usize, Vec<u8>)>,
}

impl FileReader {
    pub fn new(store: Arc<dyn ObjectStore>, metadata: &FileMetadata, inode: FileInode) -> Self {
        Self {
            store,
            blocks: inode.blocks,
            block_size: u64::from(metadata.block_size),
            size: metadata.size,
            position: 0,
            current: None,
        }
    }

    /// Total file size in bytes.
    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn load_block(&mut self, index: usize) -> io::Result<&[u8]> {
        let cached = matches!(&self.current, Some((i, _)) if *i == index);
        if !cached {
            let block = self.blocks.get(index).ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "offset beyond last block")
            })?;
            let data = self
                .store
                .download_blob(&block.address)
                .map_err(io::Error::other)?;
            if data.len() as u64 != u64::from(block.size) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    FileError::CorruptBlock {
                        name: block.name.clone(),
                        expected: u64::from(block.size),
                        actual: data.len() as u64,
                    },
                ));
            }
            trace!(block = %block.name, len = data.len(), "fetched block");
            self.current = Some((index, data));
        }
        match &self.current {
            Some((_, data)) => Ok(data),
            None => Err(io::Error::other("block cache empty")),
        }
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.position >= self.size {
            return Ok(0);
        }
        if self.block_size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "zero block size"));
        }
        let index = (self.position / self.block_size) as usize;
        let offset = (self.position % self.block_size) as usize;
        let remaining = usize::try_from(self.size - self.position).unwrap_or(usize::MAX);
        let block = self.load_block(index)?;
        let rest = match block.get(offset..) {
            Some(rest) if !rest.is_empty() => rest,
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("block {index} ends before offset {offset}"),
                ))
            }
        };
        let n = rest.len().min(buf.len()).min(remaining);
        buf[..n].copy_from_slice(&rest[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(delta) => self.size.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;
        self.position = target;
        Ok(target)
    }
}

impl std::fmt::Debug for FileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileReader")
            .field("size", &self.size)
            .field("blocks", &self.blocks.len())
            .field("position", &self.position)
            .finish()
    }
}
