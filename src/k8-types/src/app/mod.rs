pub mod deployment;
pub mod scale;
