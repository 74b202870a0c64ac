//! Per-element flag words and the functions that maintain them.

pub use self::element_flags::ElementFlags;
pub use self::flag_manager::FlagManager;

mod element_flags;
mod flag_manager;
