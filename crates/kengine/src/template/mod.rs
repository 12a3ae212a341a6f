pub mod compiler;
pub mod error;
pub mod glob;
pub mod macros;
pub mod store;

pub use compiler::{Compiler, Directive, PromptItem, SourceLine, Statement, parse_line, source_lines};
pub use error::{CompileError, Result, TemplateError};
pub use macros::{MacroTable, replace_macros};
pub use store::{TemplateStore, backup_name, is_backup};
