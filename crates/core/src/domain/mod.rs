pub mod page;
pub mod snapshot;
