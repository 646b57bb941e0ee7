//! HostGuard Policy - Declared desired state and rendered file content
//!
//! - `YamlPolicy`: built-in defaults merged with local overrides, loaded once
//!   per run and passed explicitly to the collectors
//! - `Settings`: typed, required-key accessors over one policy category
//! - `TemplateRenderer`: renders managed configuration files from templates

pub mod render;
pub mod source;
pub mod value;
pub mod yaml;

pub use render::{Renderer, TemplateContext, TemplateRenderer};
pub use source::{PolicySource, Settings};
pub use value::PolicyValue;
pub use yaml::YamlPolicy;
