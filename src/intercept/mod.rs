pub mod catalog;
pub mod entry;
pub mod interceptor;
pub mod target;

pub use catalog::LibraryCatalog;
pub use entry::{EntryPoint, Handler, PatchPoint, PatchState};
pub use interceptor::{intercept, CallRecorder};
pub use target::{parse_version, InterceptionTarget};
