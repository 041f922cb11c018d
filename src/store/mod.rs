//! Persistent flow store: file header, field-mask codec, and the `Flow`
//! value type itself (§4.B, §6).

mod codec;
pub mod display;
mod fields;
mod flow;
mod header;

pub use codec::{get_flow, put_flow};
pub use display::{brief_line, verbose_lines};
pub use flow::{bits, Flow};
pub use header::{Header, MAGIC, SIZE, VERSION};

use std::io::{Read, Write};

use crate::error::StoreError;

/// Writes the file header iff the file is new (empty), otherwise checks the
/// existing header matches what we'd write now, returning `HeaderMismatch`
/// if it doesn't — §4.B's "header mismatch on reopen is fatal" contract,
/// mirroring `store_check_header` in the original C source.
pub fn open_for_append<W: Write + Read + std::io::Seek>(
    w: &mut W,
    start_time: u32,
) -> Result<Header, StoreError> {
    let len = w.seek(std::io::SeekFrom::End(0)).map_err(|e| StoreError::WriteError(e.to_string()))?;
    if len == 0 {
        let hdr = Header::new(start_time);
        hdr.write(w).map_err(|e| StoreError::WriteError(e.to_string()))?;
        return Ok(hdr);
    }

    w.seek(std::io::SeekFrom::Start(0)).map_err(|e| StoreError::WriteError(e.to_string()))?;
    let existing = Header::read(w).map_err(|_| StoreError::HeaderMismatch)?;
    w.seek(std::io::SeekFrom::End(0)).map_err(|e| StoreError::WriteError(e.to_string()))?;
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn open_for_append_writes_header_on_new_file() {
        let mut buf = Cursor::new(Vec::new());
        let hdr = open_for_append(&mut buf, 100).unwrap();
        assert_eq!(hdr.start_time, 100);
        assert_eq!(buf.get_ref().len(), SIZE);
    }

    #[test]
    fn open_for_append_reuses_existing_header() {
        let mut buf = Cursor::new(Vec::new());
        let first = open_for_append(&mut buf, 100).unwrap();
        put_flow(&mut buf, &Flow::new(), bits::ALL).unwrap();

        let second = open_for_append(&mut buf, 200).unwrap();
        assert_eq!(second, first);
        assert_ne!(second.start_time, 200);
    }

    #[test]
    fn open_for_append_rejects_garbage_existing_header() {
        let mut buf = Cursor::new(vec![0xffu8; SIZE]);
        let err = open_for_append(&mut buf, 100).unwrap_err();
        assert!(matches!(err, StoreError::HeaderMismatch));
    }
}
