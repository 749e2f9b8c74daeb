use std::ops::{Index, IndexMut};

use crate::topology::CellTopology;

/// A value per (cell, local node) pair.
///
/// Values are stored flat, in the sub-cell order of the [`CellTopology`] they were created for,
/// so parallel loops can run over `as_mut_slice()` with a single writer per slot.
#[derive(Debug, Clone)]
pub struct SubCellField<T> {
    offsets: Vec<usize>,
    values: Vec<T>,
}

impl<T: Clone + Send + Sync> SubCellField<T> {
    pub fn new(topology: &CellTopology, value: T) -> Self {
        Self {
            offsets: topology.cells_offsets().to_vec(),
            values: vec![value; topology.nsub_cells()],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.values.fill(value);
    }
}

impl<T> SubCellField<T> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn cell(&self, cell: usize) -> &[T] {
        &self.values[self.offsets[cell]..self.offsets[cell + 1]]
    }

    pub fn cell_mut(&mut self, cell: usize) -> &mut [T] {
        &mut self.values[self.offsets[cell]..self.offsets[cell + 1]]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }
}

/// Flat sub-cell index.
impl<T> Index<usize> for SubCellField<T> {
    type Output = T;

    fn index(&self, sub_cell: usize) -> &T {
        &self.values[sub_cell]
    }
}

impl<T> IndexMut<usize> for SubCellField<T> {
    fn index_mut(&mut self, sub_cell: usize) -> &mut T {
        &mut self.values[sub_cell]
    }
}

/// (cell, local node ordinal)
impl<T> Index<(usize, usize)> for SubCellField<T> {
    type Output = T;

    fn index(&self, (cell, local): (usize, usize)) -> &T {
        &self.cell(cell)[local]
    }
}

impl<T> IndexMut<(usize, usize)> for SubCellField<T> {
    fn index_mut(&mut self, (cell, local): (usize, usize)) -> &mut T {
        &mut self.cell_mut(cell)[local]
    }
}

#[cfg(test)]
mod test {
    use super::SubCellField;
    use crate::topology::CellTopology;

    #[test]
    fn test_two_level_indexing() {
        let topology = CellTopology::new(5, vec![0, 4, 7], vec![0, 1, 2, 3, 1, 4, 2]).unwrap();
        let mut field = SubCellField::new(&topology, 0usize);
        field
            .as_mut_slice()
            .iter_mut()
            .enumerate()
            .for_each(|(idx, v)| *v = idx);

        assert_eq!(field.len(), 7);
        assert_eq!(field[(1, 0)], 4);
        assert_eq!(field[(1, 2)], 6);
        assert_eq!(field.cell(0), &[0, 1, 2, 3]);
        field[(0, 3)] = 42;
        assert_eq!(field[3], 42);

        field.fill(1);
        assert_eq!(field.as_slice().iter().sum::<usize>(), 7);
    }
}
