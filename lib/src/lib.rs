use polars::prelude::*;
use std::path::Path;

pub mod aggregate;
pub mod analysis;
mod error;
pub mod features;
pub mod pbp;
pub mod play;
pub mod report;
pub mod sneak;
pub mod table;

pub use error::Error;
pub use table::FourthDowns;

pub type Result<T> = std::result::Result<T, error::Error>;

pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<DataFrame> {
    let mut file = std::fs::File::open(path)?;
    let df = ParquetReader::new(&mut file).finish()?;
    Ok(df)
}
