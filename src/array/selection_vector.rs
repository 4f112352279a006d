// Copyright 2024 RisingLight Project Authors. Licensed under Apache-2.0.

/// Ascending positions of the tuples of a vector that survived filtering so far.
///
/// The number of approved tuples is the length of the vector. Filters narrow it in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionVector {
    indices: Vec<u32>,
}

impl SelectionVector {
    /// Select every position in `0..len`.
    pub fn new_full(len: usize) -> Self {
        Self {
            indices: (0..len as u32).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn get(&self, idx: usize) -> usize {
        self.indices[idx] as usize
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.indices.iter().map(|&i| i as usize)
    }

    /// Overwrite slot `idx` with position `value`.
    ///
    /// Used while compacting survivors to the front, so `idx` never exceeds the slot being read.
    pub(crate) fn set(&mut self, idx: usize, value: usize) {
        self.indices[idx] = value as u32;
    }

    /// Keep the first `approved` slots.
    pub(crate) fn truncate(&mut self, approved: usize) {
        self.indices.truncate(approved);
    }
}

impl From<Vec<u32>> for SelectionVector {
    fn from(mut indices: Vec<u32>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }
}

impl FromIterator<usize> for SelectionVector {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        iter.into_iter()
            .map(|i| i as u32)
            .collect::<Vec<_>>()
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_unsorted() {
        let sel = SelectionVector::from(vec![5, 1, 3, 1]);
        assert_eq!(sel.as_slice(), &[1, 3, 5]);
        assert_eq!(sel.len(), 3);
    }

    #[test]
    fn test_compact() {
        let mut sel = SelectionVector::new_full(6);
        let mut approved = 0;
        for i in 0..sel.len() {
            let pos = sel.get(i);
            if pos % 2 == 0 {
                sel.set(approved, pos);
                approved += 1;
            }
        }
        sel.truncate(approved);
        assert_eq!(sel.iter().collect::<Vec<_>>(), vec![0, 2, 4]);
    }
}
