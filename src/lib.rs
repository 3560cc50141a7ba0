//! sheetscrub - Remove rows with blank cells from spreadsheets
//!
//! Reads one sheet of an Excel or CSV file, locates the requested columns in
//! its header row, and drops every data row where any of them is blank. The
//! result is either rebuilt into a fresh file or, for xlsx workbooks, edited
//! in place so that formatting survives.

pub mod config;
pub mod error;
pub mod filter;
pub mod locate;
pub mod model;
pub mod pipeline;
pub mod preserve;
pub mod reader;
pub mod report;
pub mod writer;

pub use config::Config;
pub use error::CleanError;
pub use model::Table;
pub use pipeline::{run, CleanReport};
