//! 跨边界传递的不透明值类型。

mod date_only;
mod file;
mod object_id;
mod range;

pub use date_only::DateOnly;
pub use file::File;
pub use object_id::ObjectId;
pub use range::Range;
