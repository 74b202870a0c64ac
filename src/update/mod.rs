//! Frame scheduling from accumulated dirty levels.

pub use self::dirty::{DirtyLevel, DirtyLevels, UpdateStep};
pub use self::update_manager::{UpdateManager, UpdateTarget};

mod dirty;
mod update_manager;
