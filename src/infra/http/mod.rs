mod middleware;
mod public;

pub use middleware::REQUEST_ID_HEADER;
pub use public::{CACHE_STATUS_HEADER, HttpState, REMOTE_USER_HEADER, build_router};
