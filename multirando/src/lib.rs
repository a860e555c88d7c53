pub mod completion;
pub mod playthrough;
