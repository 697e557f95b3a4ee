use std::fmt;
use std::ops::{Add, AddAssign};

use teloxide::utils::markdown as md;

/// MarkdownV2 text together with the length of the text Telegram will
/// display once the markup is parsed.
#[derive(Debug, Clone, Hash, Default, PartialEq, Eq)]
pub struct MarkdownString(String, usize);

impl fmt::Display for MarkdownString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MarkdownString {
    fn from(value: &str) -> Self {
        Self::from_str(value)
    }
}

impl AddAssign<&MarkdownString> for MarkdownString {
    fn add_assign(&mut self, rhs: &MarkdownString) {
        self.0 += &rhs.0;
        self.1 += rhs.1;
    }
}

impl AddAssign<MarkdownString> for MarkdownString {
    fn add_assign(&mut self, rhs: MarkdownString) {
        *self += &rhs
    }
}

impl AddAssign<&str> for MarkdownString {
    fn add_assign(&mut self, rhs: &str) {
        *self += &MarkdownString::from_str(rhs)
    }
}

impl<T> Add<T> for MarkdownString
where
    MarkdownString: AddAssign<T>,
{
    type Output = MarkdownString;

    fn add(mut self, rhs: T) -> Self::Output {
        self += rhs;
        self
    }
}

macro_rules! impl_methods {
    ($($method_name:ident),*) => {
        $(
            pub fn $method_name(&self) -> MarkdownString {
                MarkdownString(md::$method_name(&self.0), self.1)
            }
        )*
    };
}

impl MarkdownString {
    pub fn new() -> MarkdownString {
        MarkdownString(String::new(), 0)
    }

    /// Escapes `s` so it is shown verbatim.
    pub fn from_str(s: &str) -> MarkdownString {
        MarkdownString(md::escape(s), s.len())
    }

    impl_methods! { bold, italic }

    pub fn len_parsed(&self) -> usize {
        self.1
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
