pub mod handler;
pub mod prompt;
pub mod request;
pub mod response;

pub use handler::DiagnosticHandler;
