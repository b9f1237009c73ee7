use rustc_hash::FxHashMap;

use crate::grid::Grid;
use crate::types::{canonical, Edge};

/// Canonical node pair -> pixel coordinates of the boundary between them.
pub type EdgeCoordLookup = FxHashMap<Edge, Vec<[usize; 2]>>;

/// Indexes the boundary pixels of a 2D node-id image for overlay rendering.
///
/// For every pixel `(x, y)` whose right neighbor `(x + 1, y)` carries another
/// id, `[x + 1, y]` is appended to the horizontal lookup; for a differing
/// lower neighbor `(x, y + 1)`, `[x, y + 1]` goes to the vertical lookup.
/// Coordinate lists are in scan order, `x` outer and `y` inner.
pub fn edge_coords_2d(src: &Grid<u32, 2>) -> (EdgeCoordLookup, EdgeCoordLookup) {
    let [x_dim, y_dim] = src.shape();
    let data = src.data();
    let [x_stride, y_stride] = src.strides();

    let mut horizontal = EdgeCoordLookup::default();
    let mut vertical = EdgeCoordLookup::default();

    for x in 0..x_dim {
        for y in 0..y_dim {
            let index = x * x_stride + y * y_stride;
            let u = data[index];

            if x + 1 < x_dim {
                let v = data[index + x_stride];
                if u != v {
                    horizontal
                        .entry(canonical(u, v))
                        .or_default()
                        .push([x + 1, y]);
                }
            }

            if y + 1 < y_dim {
                let v = data[index + y_stride];
                if u != v {
                    vertical.entry(canonical(u, v)).or_default().push([x, y + 1]);
                }
            }
        }
    }

    (horizontal, vertical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_of_example_image() {
        // x = 0: 1 1 2
        // x = 1: 1 3 2
        let src = Grid::from_vec([2, 3], vec![1u32, 1, 2, 1, 3, 2]).unwrap();
        let (horizontal, vertical) = edge_coords_2d(&src);

        assert_eq!(horizontal.len(), 1);
        assert_eq!(horizontal[&(1, 3)], vec![[1, 1]]);

        assert_eq!(vertical.len(), 3);
        assert_eq!(vertical[&(1, 2)], vec![[0, 2]]);
        assert_eq!(vertical[&(1, 3)], vec![[1, 1]]);
        assert_eq!(vertical[&(2, 3)], vec![[1, 2]]);
    }

    #[test]
    fn coordinates_follow_scan_order() {
        let src = Grid::from_vec([3, 2], vec![5u32, 5, 9, 9, 5, 5]).unwrap();
        let (horizontal, vertical) = edge_coords_2d(&src);
        assert!(vertical.is_empty());
        assert_eq!(horizontal[&(5, 9)], vec![[1, 0], [1, 1], [2, 0], [2, 1]]);
    }

    #[test]
    fn uniform_image_has_no_boundaries() {
        let src = Grid::filled([4, 4], 3u32).unwrap();
        let (horizontal, vertical) = edge_coords_2d(&src);
        assert!(horizontal.is_empty() && vertical.is_empty());
    }
}
