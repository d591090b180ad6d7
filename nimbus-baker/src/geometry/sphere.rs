use super::Point;

/// A sphere.
/// Spheres are used to define a region of influence around a point.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Sphere {
    /// The center.
    pub center: Point,

    /// The radius.
    pub radius: f32,
}

impl Sphere {
    pub const fn new(center: Point, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Returns `true` if `point` lies inside the sphere or on its surface.
    pub fn contains(&self, point: Point) -> bool {
        (point - self.center).length_squared() <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let sphere = Sphere::new(Point::new(0.0, 1.5, 0.0), 1.0);

        assert!(sphere.contains(Point::new(0.0, 1.5, 0.0)));
        assert!(sphere.contains(Point::new(1.0, 1.5, 0.0)));
        assert!(!sphere.contains(Point::new(1.0, 2.5, 0.0)));
    }

    #[test]
    fn test_zero_radius() {
        let sphere = Sphere::default();

        assert!(sphere.contains(Point::ZERO));
        assert!(!sphere.contains(Point::new(0.001, 0.0, 0.0)));
    }
}
