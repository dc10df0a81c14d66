use crate::math::Point;

/// Anything that can enumerate a set of [Point]s and report their number. This is the input interface of the
/// segmentation pipeline
pub trait PointSource {
    /// Number of points in this source
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all points of this source
    fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_>;
}

impl PointSource for [Point] {
    fn len(&self) -> usize {
        <[Point]>::len(self)
    }

    fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        Box::new(self.iter())
    }
}

impl PointSource for Vec<Point> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn points(&self) -> Box<dyn Iterator<Item = &Point> + '_> {
        Box::new(self.iter())
    }
}
