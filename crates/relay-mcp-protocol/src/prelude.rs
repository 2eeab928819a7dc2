//! Commonly used protocol types.

pub use crate::content::ContentBlock;
pub use crate::elicitation::*;
pub use crate::initialize::*;
pub use crate::meta::{Cursor, Meta, RELATED_TASK_META_KEY};
pub use crate::notifications::*;
pub use crate::roots::*;
pub use crate::sampling::*;
pub use crate::tasks::*;
pub use crate::tools::*;
pub use crate::{McpError, McpResult, methods};
