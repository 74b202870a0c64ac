//! Screen projection, back-face culling and hit-testing.
//!
//! The passes are implemented twice behind [`ComputeBackend`]: sequentially
//! on the CPU ([`SoftwareBackend`]) and as wgpu compute shaders
//! ([`HardwareBackend`]).

pub use self::backend::{
    BackendKind, BackendPreference, ComputeBackend, FlagArrays, FlagArraysMut, HitQuery,
    HitResult, PendingUploads, PointSet, ProjectionParams, SceneArrays,
};
pub use self::hardware::HardwareBackend;
pub use self::software::SoftwareBackend;

mod backend;
pub mod geometry;
mod hardware;
mod software;

/// Creates the backend matching `preference`.
///
/// Hardware is probed for `Auto` and `Hardware`; the software backend is
/// returned whenever the probe fails.
pub fn create_backend(preference: BackendPreference) -> Box<dyn ComputeBackend> {
    if preference == BackendPreference::Software {
        log::info!("software picking backend selected by configuration");
        return Box::new(SoftwareBackend::new());
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        match HardwareBackend::probe() {
            Ok(backend) => return Box::new(backend),
            Err(err) if preference == BackendPreference::Hardware => {
                log::warn!("hardware picking backend unavailable, using software: {err}")
            }
            Err(err) => log::info!("no hardware picking backend ({err}), using software"),
        }
    }

    Box::new(SoftwareBackend::new())
}
