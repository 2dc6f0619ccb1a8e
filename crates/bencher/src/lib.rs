use wam::RequestBody;

/// A route pattern paired with a request path to run against it.
#[derive(Debug, Copy, Clone)]
pub struct RouteCase {
    name: &'static str,
    group: TestGroup,
    pattern: &'static str,
    path: &'static str,
}

impl RouteCase {
    pub const fn new(name: &'static str, group: TestGroup, pattern: &'static str, path: &'static str) -> Self {
        Self { name, group, pattern, path }
    }

    pub const fn small(name: &'static str, pattern: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Small, pattern, path)
    }

    pub const fn normal(name: &'static str, pattern: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Normal, pattern, path)
    }

    pub const fn large(name: &'static str, pattern: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Large, pattern, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    pub fn path(&self) -> &'static str {
        self.path
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Normal,
    Large,
}

/// A bodiless GET request for `path`.
pub fn get_request(path: &str) -> http::Request<RequestBody> {
    let mut request = http::Request::new(RequestBody::empty());
    if let Ok(uri) = path.parse() {
        *request.uri_mut() = uri;
    }
    request
}
