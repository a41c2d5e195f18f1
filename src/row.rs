//! Row and field data model.
//!
//! A [`RowBuffer`] is the reusable storage a [`RowSource`](crate::source::RowSource)
//! fills on every fetch: one contiguous byte buffer, the end offset of each
//! field, and a null flag per field. Clearing it keeps the allocations, so a
//! long export reuses the same memory for every row.
//!
//! [`Field`] is a borrowed view into that storage. It cannot outlive the
//! buffer borrow it came from, which is what keeps the consumer from holding
//! on to bytes after the buffer has been handed back for the next fetch.

/// One column value: raw bytes, or SQL `NULL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field<'a> {
    value: Option<&'a [u8]>,
}

impl<'a> Field<'a> {
    /// A non-null field holding `bytes`.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { value: Some(bytes) }
    }

    /// A null field.
    #[must_use]
    pub fn null() -> Self {
        Self { value: None }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The raw bytes; empty for a null field.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.value.unwrap_or_default()
    }

    /// The raw bytes, or `None` for a null field.
    #[must_use]
    pub fn value(&self) -> Option<&'a [u8]> {
        self.value
    }
}

impl<'a> From<Option<&'a [u8]>> for Field<'a> {
    fn from(value: Option<&'a [u8]>) -> Self {
        Self { value }
    }
}

impl<'a> From<&'a [u8]> for Field<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::new(bytes)
    }
}

impl<'a> From<&'a str> for Field<'a> {
    fn from(s: &'a str) -> Self {
        Self::new(s.as_bytes())
    }
}

/// Reusable storage for one row.
#[derive(Clone, Debug, Default)]
pub struct RowBuffer {
    data: Vec<u8>,
    ends: Vec<usize>,
    nulls: Vec<bool>,
}

impl RowBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-sized for `columns` fields and `bytes` bytes of content.
    #[must_use]
    pub fn with_capacity(columns: usize, bytes: usize) -> Self {
        Self {
            data: Vec::with_capacity(bytes),
            ends: Vec::with_capacity(columns),
            nulls: Vec::with_capacity(columns),
        }
    }

    /// Drop every field but keep the allocations.
    pub fn clear(&mut self) {
        self.data.clear();
        self.ends.clear();
        self.nulls.clear();
    }

    /// Append a non-null field.
    pub fn push_field(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        self.ends.push(self.data.len());
        self.nulls.push(false);
    }

    /// Append a null field.
    pub fn push_null(&mut self) {
        self.ends.push(self.data.len());
        self.nulls.push(true);
    }

    /// Append a field that may be null.
    pub fn push(&mut self, value: Option<&[u8]>) {
        match value {
            Some(bytes) => self.push_field(bytes),
            None => self.push_null(),
        }
    }

    /// Overwrite bytes of field `index` in place, keeping its length.
    ///
    /// Used by sources that model a driver-owned scan buffer. Returns `false`
    /// when the index is out of range or the lengths differ.
    pub fn overwrite_field(&mut self, index: usize, bytes: &[u8]) -> bool {
        let Some(&end) = self.ends.get(index) else {
            return false;
        };
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        if end - start != bytes.len() {
            return false;
        }
        self.data[start..end].copy_from_slice(bytes);
        self.nulls[index] = false;
        true
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Total content bytes across all fields.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Field at `index`, or `None` past the end.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Field<'_>> {
        (index < self.len()).then(|| self.field_at(index))
    }

    /// Iterate fields in column order.
    pub fn fields(&self) -> impl ExactSizeIterator<Item = Field<'_>> + '_ {
        (0..self.len()).map(move |i| self.field_at(i))
    }

    fn field_at(&self, index: usize) -> Field<'_> {
        if self.nulls[index] {
            return Field::null();
        }
        let start = if index == 0 { 0 } else { self.ends[index - 1] };
        Field::new(&self.data[start..self.ends[index]])
    }

    /// Copy the row out as owned values, for callers that must keep it past
    /// the next fetch.
    #[must_use]
    pub fn to_owned_fields(&self) -> Vec<Option<Vec<u8>>> {
        self.fields().map(|f| f.value().map(<[u8]>::to_vec)).collect()
    }
}
