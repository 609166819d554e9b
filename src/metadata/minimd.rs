//! The engine's read-only metadata model and its hot-table cache.
//!
//! Optimized images store each table as a plain array of fixed-width records. A subset of the
//! rows may additionally be copied into a hot table, a small cache laid out for locality, whose
//! records must be preferred over the cold copy when present.

use crate::{
    layout::Address,
    metadata::{tableid::TableId, token::Token},
    probe::io,
    Error, Result,
};

overlay! {
    /// The metadata model embedded in an importer
    MiniMd
}

impl<'e> MiniMd<'e> {
    /// Number of rows of `table`
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        let layout = &self.engine().profile().mini_md;
        unsafe { layout.row_counts.read(self.address(), table.index()) }
    }

    /// Width of one record of `table`
    #[must_use]
    pub fn record_size(&self, table: TableId) -> usize {
        let layout = &self.engine().profile().mini_md;
        usize::from(unsafe { layout.record_sizes.read(self.address(), table.index()) })
    }

    /// Start of the cold record array of `table`
    #[must_use]
    pub fn table_data(&self, table: TableId) -> Address {
        let layout = &self.engine().profile().mini_md;
        unsafe { layout.table_data.read(self.address(), table.index()) }
    }

    /// The hot-table header of `table`, `None` if the image has no hot data for it
    #[must_use]
    pub fn hot_table(&self, table: TableId) -> Option<HotTable<'e>> {
        let directory: Address = read_field!(self, mini_md.hot_tables);
        let directory = directory.non_null()?;

        let layout = &self.engine().profile().hot_table;
        let offset = unsafe { layout.directory_offsets.read(directory, table.index()) };
        if offset == 0 {
            return None;
        }

        let header = directory.offset(offset as isize);
        Some(unsafe { HotTable::new(self.engine(), header) })
    }

    /// The cold record of row `rid`, without any bounds check
    #[must_use]
    pub fn cold_row(&self, table: TableId, rid: u32) -> Address {
        let index = rid.saturating_sub(1) as usize;
        self.table_data(table).add(index * self.record_size(table))
    }

    /// The record of row `rid`, the hot copy if one exists
    #[must_use]
    pub fn row(&self, table: TableId, rid: u32) -> Address {
        let record_size = self.record_size(table);
        self.hot_table(table)
            .and_then(|hot| hot.find(rid, record_size))
            .unwrap_or_else(|| self.cold_row(table, rid))
    }

    /// The record of `table` addressed by the row index of `token`.
    ///
    /// Only the low 24 bits of the token are used, the type tag is not checked against `table`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if the row index is zero or past the table's row count.
    pub fn record_for(&self, table: TableId, token: Token) -> Result<Address> {
        let rid = token.row();
        if rid == 0 || rid > self.row_count(table) {
            return Err(Error::InvalidToken(token));
        }

        Ok(self.row(table, rid))
    }

    /// The record addressed by `token`, the table taken from the token's type tag
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] if the type tag names no table or the row is out of range.
    pub fn record(&self, token: Token) -> Result<Address> {
        self.record_for(TableId::try_from(token)?, token)
    }
}

overlay! {
    /// Header of one hot table.
    ///
    /// A dense hot table holds rows `1..=record_count` in order. A hashed one buckets rows by
    /// their low `shift` bits: the first level maps a bucket to a range of the second level, whose
    /// key bytes hold the remaining row bits of each hot record in hot-data order.
    HotTable
}

impl HotTable<'_> {
    /// Number of hot records
    #[must_use]
    pub fn record_count(&self) -> u32 {
        read_field!(self, hot_table.record_count)
    }

    /// Rows are stored in order without the two-level index
    #[must_use]
    pub fn is_dense(&self) -> bool {
        let first_level: u32 = read_field!(self, hot_table.first_level_offset);
        first_level == 0
    }

    fn hot_data(&self) -> Address {
        let offset: u32 = read_field!(self, hot_table.hot_data_offset);
        self.address().add(offset as usize)
    }

    /// The hot record of row `rid`, `None` if the row is not hot
    #[must_use]
    pub fn find(&self, rid: u32, record_size: usize) -> Option<Address> {
        if rid == 0 {
            return None;
        }

        if self.is_dense() {
            if rid > self.record_count() {
                return None;
            }
            return Some(self.hot_data().add((rid - 1) as usize * record_size));
        }

        let first_level: u32 = read_field!(self, hot_table.first_level_offset);
        let second_level: u32 = read_field!(self, hot_table.second_level_offset);
        let shift = u32::from(read_field!(self, hot_table.shift));

        let mask = 1u32.checked_shl(shift).map_or(u32::MAX, |bit| bit - 1);
        let bucket = (rid & mask) as usize;
        let key = rid.checked_shr(shift).unwrap_or(0) as u8;

        let buckets = self.address().add(first_level as usize);
        let keys = self.address().add(second_level as usize);
        let (start, end) = unsafe {
            (
                io::read::<u16>(buckets.add(bucket * 2)),
                io::read::<u16>(buckets.add((bucket + 1) * 2)),
            )
        };

        (start..end)
            .map(usize::from)
            .find(|&index| unsafe { io::read::<u8>(keys.add(index)) } == key)
            .map(|index| self.hot_data().add(index * record_size))
    }
}
