//! waymark daemon: change-check timer, reset recovery, sync processor and
//! the operator socket.

pub mod auth;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod timer;

pub use auth::{OperatorPolicy, PERMISSION_DENIED};
pub use error::DaemonError;
pub use protocol::{
    request_refresh, request_reload_surface, request_status, request_stop, send_request,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{
    init_tracing, run, start_blocking, SyncSummary, REFRESH_DONE, REFRESH_FAILED_PREFIX,
    REFRESH_STARTED,
};
pub use timer::RefreshTimer;
