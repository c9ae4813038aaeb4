pub mod logging;

pub use logging::{get_tracing_layer, request_id_middleware};
