use crate::error::ProbeError;

use super::Dataset;

/// A pixel position on the probing canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }
}

/// Every coordinate of a `height` x `width` canvas, in row-major order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpulseDataset {
    height: usize,
    width: usize,
}

impl ImpulseDataset {
    pub fn new(height: usize, width: usize) -> Result<Self, ProbeError> {
        if height == 0 || width == 0 {
            return Err(ProbeError::EmptyCanvas { height, width });
        }
        Ok(ImpulseDataset { height, width })
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.len()).map(move |k| self.get(k))
    }
}

impl Dataset for ImpulseDataset {
    type DataPoint = Coord;

    fn len(&self) -> usize {
        self.height * self.width
    }

    fn get(&self, index: usize) -> Coord {
        assert!(index < self.len(), "index {index} out of range for {} coordinates", self.len());
        Coord::new(index / self.width, index % self.width)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn row_major_order() {
        let data = ImpulseDataset::new(3, 4).unwrap();
        assert_eq!(data.len(), 12);
        assert_eq!(data.get(0), Coord::new(0, 0));
        assert_eq!(data.get(3), Coord::new(0, 3));
        assert_eq!(data.get(4), Coord::new(1, 0));
        assert_eq!(data.get(11), Coord::new(2, 3));

        let expected: Vec<_> = (0..3).flat_map(|r| (0..4).map(move |c| Coord::new(r, c))).collect();
        assert_eq!(data.iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn empty_canvas_rejected() {
        assert_eq!(
            ImpulseDataset::new(0, 5).unwrap_err(),
            ProbeError::EmptyCanvas { height: 0, width: 5 }
        );
        assert!(ImpulseDataset::new(4, 0).is_err());
        assert_eq!(ImpulseDataset::new(1, 1).unwrap().len(), 1);
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        ImpulseDataset::new(2, 2).unwrap().get(4);
    }
}
