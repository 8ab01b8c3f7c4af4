pub mod import;
pub mod scan;
pub mod status;
