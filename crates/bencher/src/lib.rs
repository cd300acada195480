#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, file: TestFile) -> Self {
        Self { name, group, file }
    }

    pub fn small(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Small, file)
    }

    pub fn large(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Large, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A request body fixture together with the `Content-Type` it is sent with.
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content_type: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content_type: &'static str, content: &'static str) -> Self {
        Self { file_name, content_type, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}

/// `Accept` headers from simple to heavily weighted.
pub const ACCEPT_HEADERS: &[(&str, &str)] = &[
    ("exact", "application/json"),
    ("browser", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8"),
    ("weighted", "application/msgpack;q=0.3, application/json;q=0.7, application/*;q=0.5, text/csv;level=1;q=0.1, */*;q=0.01"),
    ("fallback", "image/png, text/*;q=0.2, */*;q=0.1"),
];
