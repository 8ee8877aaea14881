//! Compositional construction of regular-expression patterns.
//!
//! A [`Template`] is assembled from fragments (patterns, nested templates and
//! literal strings). Pattern fragments may contain `\VAR{name}` placeholders
//! which are bound later with [`Template::apply_vars`]; once every placeholder
//! is bound, [`Template::compile`] renders the whole structure into a single
//! [`Pattern`].
//!
//! ```
//! use retemplate::{Pattern, Template};
//!
//! let template = Template::new([
//!     Pattern::new("^"),
//!     Pattern::new(r"\VAR{x}"),
//!     Pattern::new("$"),
//! ])?
//! .with_vars([("x", Pattern::new("a+b"))])?;
//!
//! assert_eq!(template.compile()?.as_str(), "^a+b$");
//! # Ok::<(), retemplate::TemplateError>(())
//! ```

pub mod definition;
pub mod error;
pub mod escape;
pub mod fragment;
pub mod pattern;
pub mod scanner;
pub mod template;

pub use definition::{Definition, DefinitionError};
pub use error::TemplateError;
pub use escape::escape_literal;
pub use fragment::{Fragment, IntoFragment};
pub use pattern::Pattern;
pub use scanner::scan_placeholders;
pub use template::Template;
