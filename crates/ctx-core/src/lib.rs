pub mod agent;
pub mod discovery;
pub mod document;
pub mod error;
pub mod expand;
pub mod frontmatter;
pub mod io;
pub mod params;
pub mod process;
pub mod remote;
pub mod selectors;
pub mod skills;
pub mod task;

pub use agent::{Agent, AgentTable};
pub use discovery::{Assembler, Options, TaskSummary};
pub use document::{ContextResult, Document};
pub use error::{CtxError, Result};
pub use params::Params;
pub use selectors::Selectors;
