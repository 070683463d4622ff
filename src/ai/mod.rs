mod invoker;
mod normalizer;
mod prompt;
mod provider;

pub use invoker::{Invocation, ResilientInvoker, RetryPolicy};
pub use normalizer::{normalize, strip_code_fence};
pub use prompt::extraction_prompt;
pub use provider::{backend_ids, Completion, Provider, ProviderSettings};
