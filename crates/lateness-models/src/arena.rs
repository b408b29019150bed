//! Ragged storage for many token matrices of one dimension.
//!
//! All rows live in a single flat `f32` buffer; each entry is a `Span` of
//! rows into it. Replacing an entry appends the new rows and repoints the
//! span, leaving the old rows dead until [`RaggedArena::compact`] runs.

use crate::{MultiVectorView, ShapeError};

/// Location of one entry inside the arena, in rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug, Clone)]
pub struct RaggedArena {
    dim: usize,
    data: Vec<f32>,
    spans: Vec<Span>,
    dead_rows: usize,
}

impl RaggedArena {
    pub fn new(dim: usize) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        Ok(Self {
            dim,
            data: Vec::new(),
            spans: Vec::new(),
            dead_rows: 0,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Rows currently held in the buffer, dead ones included.
    pub fn total_rows(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn dead_rows(&self) -> usize {
        self.dead_rows
    }

    pub fn span(&self, index: usize) -> Option<Span> {
        self.spans.get(index).copied()
    }

    /// Append an entry and return its index.
    pub fn push(&mut self, tokens: MultiVectorView<'_>) -> Result<usize, ShapeError> {
        let span = self.append_rows(tokens)?;
        self.spans.push(span);
        Ok(self.spans.len() - 1)
    }

    /// Point an existing entry at new rows.
    pub fn replace(&mut self, index: usize, tokens: MultiVectorView<'_>) -> Result<(), ShapeError> {
        if index >= self.spans.len() {
            return Err(ShapeError::UnknownEntry(index));
        }
        let span = self.append_rows(tokens)?;
        self.dead_rows += self.spans[index].len;
        self.spans[index] = span;

        if self.dead_rows > self.total_rows() / 2 {
            self.compact();
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<MultiVectorView<'_>> {
        let span = self.spans.get(index)?;
        let start = span.offset * self.dim;
        let end = start + span.len * self.dim;
        Some(MultiVectorView::new(self.dim, &self.data[start..end]))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, MultiVectorView<'_>)> + '_ {
        (0..self.spans.len()).filter_map(move |i| self.get(i).map(|v| (i, v)))
    }

    /// Rewrite the buffer so it holds only live rows, in entry order.
    pub fn compact(&mut self) {
        if self.dead_rows == 0 {
            return;
        }

        let live: usize = self.spans.iter().map(|s| s.len).sum();
        let mut data = Vec::with_capacity(live * self.dim);
        for span in &mut self.spans {
            let start = span.offset * self.dim;
            let end = start + span.len * self.dim;
            let offset = data.len() / self.dim;
            data.extend_from_slice(&self.data[start..end]);
            span.offset = offset;
        }

        self.data = data;
        self.dead_rows = 0;
    }

    fn append_rows(&mut self, tokens: MultiVectorView<'_>) -> Result<Span, ShapeError> {
        if tokens.dim() != self.dim {
            return Err(ShapeError::DimensionMismatch {
                expected: self.dim,
                found: tokens.dim(),
            });
        }
        if tokens.is_empty() {
            return Err(ShapeError::Empty);
        }

        let span = Span {
            offset: self.total_rows(),
            len: tokens.len(),
        };
        self.data.extend_from_slice(tokens.as_flat());
        Ok(span)
    }
}
