//! Generic (Command Console / Calvin) CEL format.
//!
//! [`container`] walks the self-describing container, [`cel`] layers
//! the CEL data-set conventions on top, and [`cursor`] hides the
//! plain-file vs. gzip-stream difference behind a forward-only cursor.

pub(crate) mod cel;
pub(crate) mod container;
pub(crate) mod cursor;

use std::path::Path;

use crate::error::Result;

use container::GenericReader;
use cursor::{FileCursor, GzCursor};

pub(crate) fn open_plain(path: &Path) -> Result<GenericReader<FileCursor>> {
    Ok(GenericReader::new(FileCursor::open(path)?, path))
}

pub(crate) fn open_gz(path: &Path) -> Result<GenericReader<GzCursor>> {
    Ok(GenericReader::new(GzCursor::open(path)?, path))
}
