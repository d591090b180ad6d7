//! Ray tracing backends.

use crate::Sealed;

/// The built-in ray tracer.
///
/// Supports multi-threading. Runs on all platforms.
#[derive(Debug)]
pub struct DefaultRayTracer;

/// The Intel Embree ray tracer.
///
/// Supports multi-threading.
/// This is a highly optimized implementation, and is likely to be faster than the default ray tracer.
#[derive(Debug)]
pub struct Embree;

/// The AMD Radeon Rays ray tracer.
///
/// Rays are traced on a GPU, and the resulting energy fields live in device memory until explicitly copied back to the host.
/// Tracing many probes in one dispatch is cheap on this backend, so bakes batch probes together.
#[derive(Debug)]
pub struct RadeonRays;

/// Allows you to plug in your own ray tracer.
#[derive(Debug)]
pub struct CustomRayTracer;

impl Sealed for DefaultRayTracer {}
impl Sealed for Embree {}
impl Sealed for RadeonRays {}
impl Sealed for CustomRayTracer {}

/// The kind of scene, and hence ray tracer, a simulation runs against.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SceneType {
    Default,
    Embree,
    RadeonRays,
    Custom,
}

impl SceneType {
    /// Returns `true` if this backend traces rays on a GPU, with results in device memory.
    pub const fn is_gpu(self) -> bool {
        matches!(self, Self::RadeonRays)
    }
}

/// Ray tracer implementation. Can be:
/// - [`DefaultRayTracer`]: the built-in ray tracer
/// - [`Embree`]: the Intel Embree ray tracer
/// - [`RadeonRays`]: the AMD Radeon Rays GPU ray tracer
/// - [`CustomRayTracer`]: your own ray tracer
pub trait RayTracer: Sealed {
    /// The scene type for this ray tracer implementation.
    const SCENE_TYPE: SceneType;
}

impl RayTracer for DefaultRayTracer {
    const SCENE_TYPE: SceneType = SceneType::Default;
}

impl RayTracer for Embree {
    const SCENE_TYPE: SceneType = SceneType::Embree;
}

impl RayTracer for RadeonRays {
    const SCENE_TYPE: SceneType = SceneType::RadeonRays;
}

impl RayTracer for CustomRayTracer {
    const SCENE_TYPE: SceneType = SceneType::Custom;
}
