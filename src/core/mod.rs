// Core modules implementing the value model, row iteration, result shaping, and error modeling.
pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod scan;
pub mod types;
pub mod value;
