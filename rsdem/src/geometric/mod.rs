pub mod boundary;
pub mod dem;
