pub mod market;
pub mod snapshot;
pub mod errors;

pub use market::*;
pub use snapshot::*;
pub use errors::*;
