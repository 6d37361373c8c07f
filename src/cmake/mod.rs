//! CMake 依赖声明的定位与改写

pub mod block;
pub mod locator;
pub mod rewriter;
pub mod updater;

pub use block::{scan_blocks, DeclarationBlock, FieldName, DECLARATION_KEYWORDS};
pub use locator::{find_declaration_files, find_declarations, scan_declarations};
pub use rewriter::rewrite_block;
pub use updater::{update_component, ComponentUpdater, DeclarationUpdater};
