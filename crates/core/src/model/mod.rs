pub mod entity;
pub mod extraction;
pub mod id;
pub mod links;
pub mod source;

pub use entity::*;
pub use extraction::*;
pub use id::*;
pub use links::*;
pub use source::*;
