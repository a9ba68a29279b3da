use geo::Rect;

/// Axis-aligned geographic bounding box.
///
/// `x` is longitude and `y` is latitude for EPSG:4326 data; for other input
/// reference systems the values are whatever the boundary file declares.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Both axes ordered min <= max.
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }

    /// Extent along the x axis, in the box's own units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Extent along the y axis, in the box's own units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Latitude of the box center, used when converting meters to degrees.
    pub fn center_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}
