pub mod request;
pub mod response;

pub use request::RequestContext;
pub use response::{Body, Flash, RenderedResponse};
