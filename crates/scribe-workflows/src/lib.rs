//! The content workflows: article repurposing, blog production, X post
//! refinement and thumbnail prompts, plus the service that runs them by name.

pub mod blog;
pub mod image_prompt;
pub mod repurpose;
pub mod service;
pub mod workflow;
pub mod x_post;

pub use service::{ErrorKind, WorkflowInfo, WorkflowResponse, WorkflowService, WorkflowStatus};
pub use workflow::{Workflow, WorkflowContext, WorkflowRegistry};
pub use x_post::{IdeaRequest, IdeasResponse, XPostInput, XPostResponse};
