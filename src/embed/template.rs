//! Embedded text with typed placeholder substitution.

use std::marker::PhantomData;

/// Variables substituted into an embedded text.
pub trait TemplateVars {
    fn apply(&self, content: &str) -> String;
}

/// Compile-time embedded text with typed variable injection.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _marker: PhantomData<V>,
}

impl<V> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _marker: PhantomData,
        }
    }

    pub const fn content(&self) -> &'static str {
        self.content
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.apply(self.content)
    }
}
