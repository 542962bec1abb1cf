pub mod address;
pub mod depend;
pub mod dump;
pub mod get;
pub mod select;
pub mod set;
pub mod snapshot;
pub mod unset;
