//! RFC 6570 URI templates and structured HTTP header values.
//!
//! ```
//! use hrefkit::template::{MapContext, Template};
//!
//! let template = Template::parse("http://example.com/search{?q,lang}").unwrap();
//! let context = MapContext::new().with("q", "cat videos").with("lang", "en");
//! assert_eq!(
//!     template.expand(&context).unwrap(),
//!     "http://example.com/search?q=cat%20videos&lang=en"
//! );
//! ```

pub mod config;
pub mod domain;
pub mod encoding;
pub mod error;

pub use domain::{http, template};
pub use error::{Error, Result};
