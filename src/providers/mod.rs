pub mod frankfurter;
pub mod util;
pub mod wise;

pub use frankfurter::FrankfurterProvider;
pub use wise::WiseComparisonProvider;
