//! Recipe loading and directive parsing
//!
//! A recipe is a script whose leading comment block carries `PLASMA`
//! directives:
//!
//! ```text
//! #!/usr/bin/env -S plasma run node
//! //PLASMA input "src/**/*.js"
//! //PLASMA output "dist/"
//! //PLASMA cache ttl="1h"
//! //PLASMA env "NODE_ENV"
//! //PLASMA runtime include-version=true
//! ```
//!
//! Directives are turned into typed values as soon as the recipe is loaded;
//! nothing downstream looks at the raw comment text again.

pub mod directive;
pub mod duration;
mod lexer;
pub mod parser;
pub mod recipe;

pub use directive::{Directive, RuntimeOptions, INCLUDE_VERSION_OPTION};
pub use duration::parse_duration;
pub use parser::{parse_header, CommentStyle, ParsedHeader};
pub use recipe::Recipe;
