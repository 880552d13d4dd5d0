//! 指令层：指令描述符、注册表、参数校验器与内置指令集

pub mod builtin;
pub mod descriptor;
pub mod registry;
pub mod validators;

pub use builtin::register_builtin;
pub use descriptor::{CommandBody, CommandDescriptor, PermissionTier, Validator};
pub use registry::{CommandRegistry, DuplicatePolicy};
