pub mod answer;
pub mod collaborators;
pub mod context;
pub mod datasource;
pub mod error;
pub mod profile;
pub mod response_parser;
pub mod rls;
pub mod state_machine;

pub use answer::Answer;
pub use collaborators::Collaborators;
pub use context::{LoginUser, ProcessingContext};
pub use error::{GenBiError, Result};
pub use state_machine::{QueryState, QueryStateMachine};
