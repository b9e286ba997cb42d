pub mod config;
pub mod http;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use http::HttpTransport;
pub use session::{ApiSession, Exchange, TransportFailure};
pub use transport::{ClientError, ClientResult, Transport};
pub use types::{ApiRequest, ApiResponse, Method, ResponseBody};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::http::*;
    pub use crate::session::*;
    pub use crate::transport::*;
    pub use crate::types::*;
}
