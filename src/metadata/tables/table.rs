use std::{marker::PhantomData, ops::Range};

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::{
    file::Lifeline,
    metadata::tables::{search, RowReadable, TableId, TableInfoRef},
    Error, Result,
};

/// Typed random access to the rows of one metadata table.
///
/// A `MetadataTable` is a bounds-checked window onto the rows of one table inside the `#~`
/// stream. Rows are decoded on demand; nothing is copied or cached. Every access first checks
/// the lifeline of the owning image.
///
/// Row indexes are zero-based; the decoded rows carry their one-based `rid` and token.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sorted: bool,
    info: TableInfoRef,
    lifeline: Lifeline<'a>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a table over `data`, which must start at the first row of `T::TABLE`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` cannot hold all rows.
    pub fn new(
        data: &'a [u8],
        info: TableInfoRef,
        sorted: bool,
        lifeline: Lifeline<'a>,
    ) -> Result<Self> {
        let size = info.table_size(T::TABLE);
        let data = data.get(..size).ok_or_else(|| out_of_bounds_error!())?;

        Ok(MetadataTable {
            data,
            row_count: info.rows(T::TABLE),
            row_size: info.row_size(T::TABLE),
            sorted,
            info,
            lifeline,
            _marker: PhantomData,
        })
    }

    /// The table this view reads
    #[must_use]
    pub fn table_id(&self) -> TableId {
        T::TABLE
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Byte size of one row
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Byte size of the whole table
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Returns true if the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Returns true if the table is flagged as sorted in the `#~` header
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// The raw bytes of the row at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index >= row_count`, and
    /// [`crate::Error::Disposed`] once the image is disposed.
    pub fn row_bytes(&self, index: u32) -> Result<&'a [u8]> {
        self.lifeline.check()?;
        if index >= self.row_count {
            return Err(out_of_bounds_error!());
        }

        let start = index as usize * self.row_size as usize;
        self.data
            .get(start..start + self.row_size as usize)
            .ok_or_else(|| out_of_bounds_error!())
    }

    /// Decode the row at zero-based `index`.
    ///
    /// # Errors
    /// Same as [`MetadataTable::row_bytes`], plus [`crate::Error::Malformed`] for a coded
    /// index with an invalid tag.
    pub fn get(&self, index: u32) -> Result<T> {
        let row = self.row_bytes(index)?;
        T::row_read(row, &mut 0, index + 1, &self.info)
    }

    /// Decode the row with one-based `rid`, as stored in tokens and simple indexes.
    ///
    /// # Errors
    /// Same as [`MetadataTable::get`]; a `rid` of zero is out of bounds.
    pub fn get_rid(&self, rid: u32) -> Result<T> {
        let index = rid.checked_sub(1).ok_or_else(|| out_of_bounds_error!())?;
        self.get(index)
    }

    /// Iterate over all rows in order.
    ///
    /// Iteration ends early at the first row that cannot be decoded.
    #[must_use]
    pub fn iter(&self) -> TableIterator<'_, 'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
        }
    }

    /// Decode all rows in parallel.
    ///
    /// Yields one result per row; order is not preserved unless collected into an indexed
    /// collection.
    pub fn par_iter(&self) -> impl ParallelIterator<Item = Result<T>> + '_ {
        (0..self.row_count)
            .into_par_iter()
            .map(move |index| self.get(index))
    }

    fn require_sorted(&self) -> Result<()> {
        if self.sorted {
            Ok(())
        } else {
            Err(Error::Precondition(format!(
                "range search on table {:?}, which is not flagged as sorted",
                T::TABLE
            )))
        }
    }

    /// Index of the last row whose projected key is smaller than `key`, `None` if no row is.
    ///
    /// # Errors
    /// Returns [`crate::Error::Precondition`] if the table is not flagged as sorted, and any
    /// error raised while decoding the probed rows.
    pub fn greatest_lower_bound<K: Ord>(
        &self,
        key: &K,
        project: impl Fn(&T) -> K,
    ) -> Result<Option<u32>> {
        self.require_sorted()?;
        search::greatest_lower_bound(self.row_count, key, |index| {
            self.get(index).map(|row| project(&row))
        })
    }

    /// Index of the first row whose projected key is greater than `key`, or `row_count`.
    ///
    /// # Errors
    /// Same as [`MetadataTable::greatest_lower_bound`].
    pub fn least_upper_bound<K: Ord>(&self, key: &K, project: impl Fn(&T) -> K) -> Result<u32> {
        self.require_sorted()?;
        search::least_upper_bound(self.row_count, key, |index| {
            self.get(index).map(|row| project(&row))
        })
    }

    /// The rows whose projected key equals `key`: the open interval between
    /// [`MetadataTable::greatest_lower_bound`] and [`MetadataTable::least_upper_bound`].
    ///
    /// # Errors
    /// Same as [`MetadataTable::greatest_lower_bound`].
    pub fn children<K: Ord>(&self, key: &K, project: impl Fn(&T) -> K) -> Result<Range<u32>> {
        self.require_sorted()?;
        search::equal_range(self.row_count, key, |index| {
            self.get(index).map(|row| project(&row))
        })
    }

    /// Number of leading rows whose projected key is at most `key`, without requiring the
    /// sorted flag. Only valid for columns that are monotonic by construction, such as the
    /// list columns of `TypeDef`.
    pub(crate) fn count_at_most<K: Ord>(&self, key: &K, project: impl Fn(&T) -> K) -> Result<u32> {
        search::least_upper_bound(self.row_count, key, |index| {
            self.get(index).map(|row| project(&row))
        })
    }
}

impl<'t, 'a, T: RowReadable> IntoIterator for &'t MetadataTable<'a, T> {
    type Item = T;
    type IntoIter = TableIterator<'t, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Sequential iterator over the rows of a [`MetadataTable`]
pub struct TableIterator<'t, 'a, T> {
    table: &'t MetadataTable<'a, T>,
    current_row: u32,
}

impl<T: RowReadable> Iterator for TableIterator<'_, '_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        match self.table.get(self.current_row) {
            Ok(row) => {
                self.current_row += 1;
                Some(row)
            }
            Err(_) => {
                self.current_row = self.table.row_count;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.table.row_count - self.current_row) as usize;
        (0, Some(left))
    }
}

impl<T> std::fmt::Debug for MetadataTable<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataTable")
            .field("row_count", &self.row_count)
            .field("row_size", &self.row_size)
            .field("sorted", &self.sorted)
            .finish_non_exhaustive()
    }
}
