pub mod branch_opt_util;
pub mod database;
pub mod error;
pub mod hint;
pub mod params;
pub mod prf;
pub mod serialization;
