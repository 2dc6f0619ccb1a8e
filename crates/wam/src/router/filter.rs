//! Method constraints for routes.
//!
//! # Examples
//!
//! ```
//! use wam::router::filter::MethodFilter;
//! use http::Method;
//!
//! let filter = MethodFilter::list(["get", "HEAD"]).unwrap();
//! assert!(filter.matches(&Method::HEAD));
//!
//! assert!(MethodFilter::from(Method::GET).matches(&Method::GET));
//! assert!(MethodFilter::parse("all").unwrap().matches(&Method::DELETE));
//! ```

use super::RouteError;
use http::Method;

/// The methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MethodFilter {
    #[default]
    Any,
    One(Method),
    Many(Vec<Method>),
}

impl MethodFilter {
    /// Parses a method name, case-insensitively. `ALL` and `*` accept any method.
    pub fn parse(method: &str) -> Result<Self, RouteError> {
        let upper = method.trim().to_ascii_uppercase();
        if upper == "ALL" || upper == "*" {
            return Ok(MethodFilter::Any);
        }
        parse_method(&upper).map(MethodFilter::One)
    }

    pub fn list<I, S>(methods: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let methods = methods
            .into_iter()
            .map(|method| parse_method(&method.as_ref().trim().to_ascii_uppercase()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MethodFilter::Many(methods))
    }

    pub fn matches(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::One(expected) => expected == method,
            MethodFilter::Many(methods) => methods.contains(method),
        }
    }
}

fn parse_method(method: &str) -> Result<Method, RouteError> {
    Method::from_bytes(method.as_bytes()).map_err(|_invalid| RouteError::InvalidMethod { method: method.to_owned() })
}

impl From<Method> for MethodFilter {
    fn from(method: Method) -> Self {
        MethodFilter::One(method)
    }
}

impl From<Vec<Method>> for MethodFilter {
    fn from(methods: Vec<Method>) -> Self {
        MethodFilter::Many(methods)
    }
}

impl<const N: usize> From<[Method; N]> for MethodFilter {
    fn from(methods: [Method; N]) -> Self {
        MethodFilter::Many(methods.into())
    }
}
