mod batch;
mod expense;
mod fee;
mod id;
mod money;
mod student;
mod summary;

pub use batch::*;
pub use expense::*;
pub use fee::*;
pub use id::*;
pub use money::*;
pub use student::*;
pub use summary::*;
