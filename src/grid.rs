use std::ops::Range;

use crate::error::{CarvingError, Result};

/// Dense `D`-dimensional array in row-major order (last axis fastest).
///
/// Coordinates are `[usize; D]`; axis 0 is the outermost axis and is the one
/// parallel scans split into slabs.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid<T, const D: usize> {
    shape: [usize; D],
    strides: [usize; D],
    data: Vec<T>,
}

fn volume_of<const D: usize>(shape: &[usize; D]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n))
}

fn strides_of<const D: usize>(shape: &[usize; D]) -> [usize; D] {
    let mut strides = [1; D];
    for axis in (0..D.saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

impl<T, const D: usize> Grid<T, D> {
    pub fn from_vec(shape: [usize; D], data: Vec<T>) -> Result<Self> {
        if D == 0 {
            return Err(CarvingError::shape_mismatch("at least one axis", shape));
        }
        let expected = volume_of(&shape)
            .ok_or_else(|| CarvingError::shape_mismatch("addressable volume", shape))?;
        if data.len() != expected {
            return Err(CarvingError::shape_mismatch(expected, data.len()));
        }

        Ok(Self {
            shape,
            strides: strides_of(&shape),
            data,
        })
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Flat index of `coord`, or `None` when it lies outside the grid.
    pub fn index_of(&self, coord: [usize; D]) -> Option<usize> {
        let mut index = 0;
        for axis in 0..D {
            if coord[axis] >= self.shape[axis] {
                return None;
            }
            index += coord[axis] * self.strides[axis];
        }
        Some(index)
    }

    pub fn get(&self, coord: [usize; D]) -> Option<&T> {
        self.index_of(coord).map(|index| &self.data[index])
    }

    /// Calls `f(i, j)` for every pair of voxels `j = i + 1 step along some axis`,
    /// restricted to voxels whose axis-0 coordinate lies in `slabs`.
    ///
    /// Every orthogonally adjacent pair of the grid is visited exactly once when
    /// the slab ranges partition `0..shape[0]`.
    pub(crate) fn for_each_forward_pair<F>(&self, slabs: Range<usize>, mut f: F)
    where
        F: FnMut(usize, usize),
    {
        let end_slab = slabs.end.min(self.shape[0]);
        if self.data.is_empty() || slabs.start >= end_slab {
            return;
        }

        let mut coord = [0usize; D];
        coord[0] = slabs.start;
        let mut index = slabs.start * self.strides[0];
        let end = end_slab * self.strides[0];

        while index < end {
            for axis in 0..D {
                if coord[axis] + 1 < self.shape[axis] {
                    f(index, index + self.strides[axis]);
                }
            }

            // odometer, carry stops at axis 0
            let mut axis = D - 1;
            loop {
                coord[axis] += 1;
                if axis == 0 || coord[axis] < self.shape[axis] {
                    break;
                }
                coord[axis] = 0;
                axis -= 1;
            }
            index += 1;
        }
    }
}

impl<T: Clone, const D: usize> Grid<T, D> {
    pub fn filled(shape: [usize; D], value: T) -> Result<Self> {
        let len = volume_of(&shape)
            .ok_or_else(|| CarvingError::shape_mismatch("addressable volume", shape))?;
        Self::from_vec(shape, vec![value; len])
    }

    /// Copies the voxels inside `roi` into a new ROI-shaped grid.
    pub fn crop(&self, roi: &Roi<D>) -> Result<Self> {
        roi.validate(&self.shape)?;
        let mut data = Vec::with_capacity(roi.volume());
        roi.for_each_index(&self.strides, |index| data.push(self.data[index].clone()));
        Self::from_vec(roi.shape(), data)
    }
}

/// Axis-aligned box `[begin, end)` per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi<const D: usize> {
    pub begin: [usize; D],
    pub end: [usize; D],
}

impl<const D: usize> Roi<D> {
    pub fn new(begin: [usize; D], end: [usize; D]) -> Self {
        Self { begin, end }
    }

    pub fn full(shape: [usize; D]) -> Self {
        Self {
            begin: [0; D],
            end: shape,
        }
    }

    pub fn shape(&self) -> [usize; D] {
        let mut shape = [0; D];
        for axis in 0..D {
            shape[axis] = self.end[axis].saturating_sub(self.begin[axis]);
        }
        shape
    }

    pub fn volume(&self) -> usize {
        self.shape().iter().product()
    }

    /// Checks `begin <= end <= shape` on every axis.
    pub fn validate(&self, shape: &[usize; D]) -> Result<()> {
        for axis in 0..D {
            if self.begin[axis] > self.end[axis] || self.end[axis] > shape[axis] {
                return Err(CarvingError::ShapeMismatch {
                    expected: format!("roi within {shape:?}"),
                    actual: format!("{:?}..{:?}", self.begin, self.end),
                });
            }
        }
        Ok(())
    }

    /// The one-voxel-thick slice of this ROI at offset `k` along axis 0.
    pub(crate) fn axis0_slice(&self, k: usize) -> Self {
        let mut slice = *self;
        slice.begin[0] = self.begin[0] + k;
        slice.end[0] = slice.begin[0] + 1;
        slice
    }

    /// Calls `f` with the flat grid index of every voxel inside the ROI, in
    /// row-major order. The ROI must already be validated against the grid.
    pub(crate) fn for_each_index<F>(&self, strides: &[usize; D], mut f: F)
    where
        F: FnMut(usize),
    {
        if D == 0 || self.volume() == 0 {
            return;
        }
        let inner = D - 1;
        let mut coord = self.begin;

        loop {
            let base: usize = coord
                .iter()
                .zip(strides.iter())
                .map(|(c, s)| c * s)
                .sum();
            for k in 0..(self.end[inner] - self.begin[inner]) {
                f(base + k * strides[inner]);
            }

            let mut axis = inner;
            loop {
                if axis == 0 {
                    return;
                }
                axis -= 1;
                coord[axis] += 1;
                if coord[axis] < self.end[axis] {
                    break;
                }
                coord[axis] = self.begin[axis];
            }
        }
    }
}
