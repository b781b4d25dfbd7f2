use ndarray::prelude::*;

/// Inclusive bounding box of the influenced pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

impl Bounds {
    pub fn height(&self) -> usize {
        self.bottom - self.top + 1
    }

    pub fn width(&self) -> usize {
        self.right - self.left + 1
    }
}

/// Per pixel probing result. `true` means an impulse at that pixel left the
/// probed features equal to the baseline (outside the receptive field),
/// `false` means it changed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluenceMap {
    grid: Array2<bool>,
    written: Array2<bool>,
    visited: usize,
}

impl InfluenceMap {
    pub fn new(height: usize, width: usize) -> Self {
        InfluenceMap {
            grid: Array2::from_elem((height, width), true),
            written: Array2::from_elem((height, width), false),
            visited: 0,
        }
    }

    /// A repeated write replaces the value but counts the coordinate once
    pub fn set(&mut self, row: usize, col: usize, unchanged: bool) {
        self.grid[[row, col]] = unchanged;
        let written = &mut self.written[[row, col]];
        if !*written {
            *written = true;
            self.visited += 1;
        }
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.grid[[row, col]]
    }

    pub fn dim(&self) -> (usize, usize) {
        self.grid.dim()
    }

    /// Number of distinct coordinates written so far
    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn is_complete(&self) -> bool {
        self.visited == self.grid.len()
    }

    pub fn influenced_count(&self) -> usize {
        self.grid.iter().filter(|unchanged| !**unchanged).count()
    }

    pub fn influenced_bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for ((r, c), _) in self.grid.indexed_iter().filter(|(_, unchanged)| !**unchanged) {
            bounds = Some(match bounds {
                None => Bounds { top: r, left: c, bottom: r, right: c },
                Some(b) => Bounds {
                    top: b.top.min(r),
                    left: b.left.min(c),
                    bottom: b.bottom.max(r),
                    right: b.right.max(c),
                },
            });
        }
        bounds
    }

    pub fn view(&self) -> ArrayView2<bool> {
        self.grid.view()
    }

    pub fn into_inner(self) -> Array2<bool> {
        self.grid
    }
}

#[test]
fn test_bounds() {
    let mut map = InfluenceMap::new(4, 5);
    assert_eq!(map.influenced_bounds(), None);
    map.set(1, 3, false);
    map.set(2, 1, false);
    map.set(0, 0, true);
    let b = map.influenced_bounds().unwrap();
    assert_eq!(b, Bounds { top: 1, left: 1, bottom: 2, right: 3 });
    assert_eq!((b.height(), b.width()), (2, 3));
    assert_eq!(map.influenced_count(), 2);
    assert_eq!(map.visited(), 3);
    assert!(!map.is_complete());
}

#[test]
fn test_repeated_writes() {
    let mut map = InfluenceMap::new(2, 2);
    map.set(0, 0, false);
    map.set(0, 1, true);
    map.set(1, 0, true);
    map.set(1, 0, false);
    assert_eq!(map.visited(), 3);
    assert!(!map.is_complete());
    assert!(!map.get(1, 0));
    map.set(1, 1, true);
    assert!(map.is_complete());
}
