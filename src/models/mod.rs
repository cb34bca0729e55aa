pub mod pass;
pub mod scan;
