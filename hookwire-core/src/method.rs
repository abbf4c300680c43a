//! The finite set of HTTP methods the application layer dispatches on.
//!
//! The underlying transport only supports a fixed enumeration of verbs, so
//! [`Method`] is a closed enum rather than a free-form string. Parsing an
//! unsupported verb fails with [`Error::InvalidMethod`], which is also what
//! hook registration reports when handed one.

use crate::error::{Error, Result};
use std::fmt;

/// An HTTP request method supported by the dispatch layer.
///
/// # Examples
///
/// ```
/// use hookwire_core::Method;
///
/// let m = Method::parse("GET").unwrap();
/// assert_eq!(m, Method::Get);
/// assert!(Method::parse("BREW").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
    /// `PATCH`
    Patch,
}

impl Method {
    /// Every supported method, mostly useful for exercising the registry.
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Patch,
    ];

    /// Parses a method from its wire name.
    ///
    /// Matching is case-sensitive, as HTTP method names are.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMethod`] for any verb outside the supported
    /// set, including valid-but-unsupported ones like `CONNECT` or `TRACE`.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PATCH" => Ok(Method::Patch),
            other => Err(Error::InvalidMethod(other.to_string())),
        }
    }

    /// Returns the wire name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Method {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Method::parse(value)
    }
}
