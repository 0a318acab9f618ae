pub mod controller;

pub use controller::{ActiveScope, ExitReport, ScopeController};
