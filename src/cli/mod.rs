pub mod forex;
pub mod margins;
pub mod rates;
pub mod setup;
pub mod ui;
