//! Geometric primitives used to place probes, sources and listeners.

mod vector3;
pub use vector3::{Point, Vector3};

mod sphere;
pub use sphere::Sphere;

mod coordinate_system;
pub use coordinate_system::CoordinateSystem;
