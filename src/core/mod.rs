pub mod backend;
pub mod reload;
pub mod route_table;

pub use backend::{Forwarder, RouteTarget, TargetError};
pub use reload::{ReloadError, ReloadHandle, ReloadRequest, ReloadState, ReloadTrigger};
pub use route_table::{ReplaceSummary, Route, RouteSnapshot, RouteTable};
