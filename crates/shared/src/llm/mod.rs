pub mod completion;
pub mod gateway;
pub mod prompts;

pub use completion::{CompletionClientConfig, CompletionClientError, HttpCompletionClient};
pub use gateway::{
    ChatMessage, ChatRole, CompletionError, CompletionFuture, CompletionGateway,
    CompletionRequest, SamplingParameters,
};
pub use prompts::{PromptLoadError, load_system_prompt};
