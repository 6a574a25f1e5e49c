pub mod agent_state;
pub mod git_status;
pub mod machine;
pub mod metadata;
pub mod session;
pub mod sync_update;
pub mod todo;
pub mod versioned;

pub use agent_state::*;
pub use git_status::*;
pub use machine::*;
pub use metadata::*;
pub use session::*;
pub use sync_update::*;
pub use todo::*;
pub use versioned::*;
