// Application layer - reports over one snapshot of the backend collections.
// Every operation here is pure; fetching and file handling live in `io`.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
