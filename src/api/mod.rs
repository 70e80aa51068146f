mod handlers;
mod server;
#[cfg(test)]
mod tests;

pub use handlers::{ApiError, AssistantRequest};
pub use server::{router, ApiServer, ApiServerBuilder, ApiState};
