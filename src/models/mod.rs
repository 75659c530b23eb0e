pub mod enums;
pub mod language;
pub mod record;
pub mod request;

pub use enums::*;
pub use language::*;
pub use record::*;
pub use request::*;
