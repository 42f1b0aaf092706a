pub mod clip;
pub mod constraints;
pub mod stream;
