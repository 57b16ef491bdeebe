/// Mean-climate metric tables and the operations the portrait plots need.
///
/// Submodules:
/// - `table`: a single statistic/season/region table of model runs by variables.
/// - `store`: `ResultStore`, built from PMP JSON files, and its `merge`.
/// - `normalize`: median normalisation across the ensemble.

pub mod normalize;
pub mod store;
pub mod table;

pub use normalize::normalize_by_median;
pub use store::{ResultSource, ResultStore};
pub use table::{MetricsRow, MetricsTable};
