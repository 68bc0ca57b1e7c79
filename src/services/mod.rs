/// Business logic services layer
pub mod media;
pub mod pipeline;
pub mod prompt;

pub use pipeline::{Collaborators, Orchestrator};
pub use prompt::HttpCredentialPrompt;
