//! Transform module
//!
//! Turns a reconciled snapshot batch into the dimensional schema: the
//! [`DimensionResolver`] builds `pet_types`, `breeds` and `shelters`, then
//! the [`FactBuilder`] joins records to them to produce `animals`.

pub mod dimensions;
pub mod facts;

pub use dimensions::{DimensionResolver, KeyStrategy};
pub use facts::{FactBuilder, FactReport, ForeignKey, UnresolvedForeignKey};
