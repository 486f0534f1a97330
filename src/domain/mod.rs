// URI template expansion and HTTP header value types

pub mod http;
pub mod template;
