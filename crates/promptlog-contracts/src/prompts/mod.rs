mod request;
mod response;

pub use request::{
    prompt_id_from_path, ChatMessage, Mode, Parameters, PromptRequest, ProviderRequest, Role,
};
pub use response::{MalformedResponse, ProviderResponse, ResponseMetadata};
