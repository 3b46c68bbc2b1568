use crate::storage::error::{StorageError, StorageResult};
use byteorder::{ByteOrder, LittleEndian};

// Header: tuple count (2 bytes) then free space pointer (2 bytes)
pub const HEADER_SIZE: usize = 4;
const TUPLE_COUNT_OFFSET: usize = 0;
const FREE_SPACE_POINTER_OFFSET: usize = 2;

// Slot size (4 bytes: 2 for offset, 2 for length), slots grow from the end
pub const SLOT_SIZE: usize = 4;

/// Slotted page view over raw page bytes.
///
/// An all-zero buffer is an empty page, so freshly allocated pages need no
/// initialization. Deleted slots keep their position (offset and length
/// zeroed) so record ids stay stable.
pub struct HeapPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> HeapPage<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    pub fn tuple_count(&self) -> u16 {
        LittleEndian::read_u16(&self.bytes()[TUPLE_COUNT_OFFSET..])
    }

    fn free_space_pointer(&self) -> usize {
        match LittleEndian::read_u16(&self.bytes()[FREE_SPACE_POINTER_OFFSET..]) {
            0 => HEADER_SIZE,
            pointer => pointer as usize,
        }
    }

    /// Byte offset of a slot entry, or `None` if the slot array would run
    /// into the header.
    fn slot_offset(&self, slot_id: u16) -> Option<usize> {
        self.bytes()
            .len()
            .checked_sub((slot_id as usize + 1) * SLOT_SIZE)
            .filter(|&offset| offset >= HEADER_SIZE)
    }

    fn checked_slot_offset(&self, slot_id: u16) -> StorageResult<usize> {
        self.slot_offset(slot_id).ok_or_else(|| {
            StorageError::CorruptPage(format!(
                "slot {} lies outside a {}-byte page",
                slot_id,
                self.bytes().len()
            ))
        })
    }

    /// Zero when the header or slot count is corrupt.
    pub fn free_space(&self) -> usize {
        let pointer = self.free_space_pointer();
        if pointer < HEADER_SIZE {
            return 0;
        }
        self.bytes()
            .len()
            .checked_sub(self.tuple_count() as usize * SLOT_SIZE)
            .map_or(0, |slot_array_start| slot_array_start.saturating_sub(pointer))
    }

    pub fn has_room_for(&self, tuple_size: usize) -> bool {
        self.free_space() >= tuple_size + SLOT_SIZE
    }

    pub fn get_tuple(&self, slot_id: u16) -> StorageResult<&[u8]> {
        let slot_count = self.tuple_count();
        if slot_id >= slot_count {
            return Err(StorageError::InvalidSlotId {
                slot_id,
                slot_count,
            });
        }

        let slot = self.checked_slot_offset(slot_id)?;
        let offset = LittleEndian::read_u16(&self.bytes()[slot..]) as usize;
        let length = LittleEndian::read_u16(&self.bytes()[slot + 2..]) as usize;
        if offset == 0 && length == 0 {
            return Err(StorageError::TupleNotFound { slot_id });
        }

        if offset < HEADER_SIZE || offset + length > slot {
            return Err(StorageError::CorruptPage(format!(
                "slot {} points at bytes {}..{}",
                slot_id,
                offset,
                offset + length
            )));
        }
        Ok(&self.bytes()[offset..offset + length])
    }

    /// Live tuples with their slot numbers.
    pub fn tuples(&self) -> impl Iterator<Item = (u16, &[u8])> + '_ {
        (0..self.tuple_count()).filter_map(move |slot| self.get_tuple(slot).ok().map(|t| (slot, t)))
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeapPage<T> {
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    pub fn insert_tuple(&mut self, tuple: &[u8]) -> StorageResult<u16> {
        if !self.has_room_for(tuple.len()) {
            return Err(StorageError::PageFull {
                required: tuple.len() + SLOT_SIZE,
                available: self.free_space(),
            });
        }

        let slot_id = self.tuple_count();
        let slot = self.checked_slot_offset(slot_id)?;
        let offset = self.free_space_pointer();
        let end = offset + tuple.len();
        self.bytes_mut()[offset..end].copy_from_slice(tuple);

        let bytes = self.bytes_mut();
        LittleEndian::write_u16(&mut bytes[slot..], offset as u16);
        LittleEndian::write_u16(&mut bytes[slot + 2..], tuple.len() as u16);
        LittleEndian::write_u16(&mut bytes[FREE_SPACE_POINTER_OFFSET..], end as u16);
        LittleEndian::write_u16(&mut bytes[TUPLE_COUNT_OFFSET..], slot_id + 1);

        Ok(slot_id)
    }

    pub fn delete_tuple(&mut self, slot_id: u16) -> StorageResult<()> {
        // Validates the slot and rejects double deletes.
        self.get_tuple(slot_id)?;

        let slot = self.checked_slot_offset(slot_id)?;
        self.bytes_mut()[slot..slot + SLOT_SIZE].fill(0);
        Ok(())
    }
}

/// Largest tuple that fits in an empty page of `page_size` bytes.
pub fn max_tuple_size(page_size: usize) -> usize {
    page_size.saturating_sub(HEADER_SIZE + SLOT_SIZE)
}
