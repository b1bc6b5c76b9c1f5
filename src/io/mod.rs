pub mod export;
pub mod fetch;
pub mod normalize;
pub mod snapshot;

pub use export::*;
pub use fetch::*;
pub use normalize::*;
pub use snapshot::*;
