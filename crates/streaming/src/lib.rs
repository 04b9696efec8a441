pub mod queue;
pub mod request;
pub mod source;

pub use queue::*;
pub use request::*;
pub use source::*;
