//! Snapshot location templates.
//!
//! `{name}` placeholders are replaced by session parameters; `{{` and `}}`
//! produce literal braces.

use std::collections::BTreeMap;

use crate::Error;

/// Parameters substituted into location templates.
pub type TemplateParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationTemplate(String);

impl LocationTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute every placeholder.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for a placeholder without a parameter or
    /// an unbalanced brace.
    pub fn resolve(&self, params: &TemplateParams) -> Result<String, Error> {
        let mut out = String::with_capacity(self.0.len());
        let mut chars = self.0.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(Error::Configuration(format!(
                                    "unterminated placeholder in location template {:?}",
                                    self.0
                                )));
                            }
                        }
                    }
                    let value = params.get(name.trim()).ok_or_else(|| {
                        Error::Configuration(format!("location template {:?} uses unknown parameter {name:?}", self.0))
                    })?;
                    out.push_str(value);
                }
                '}' => {
                    return Err(Error::Configuration(format!("unbalanced '}}' in location template {:?}", self.0)));
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }
}

impl From<&str> for LocationTemplate {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LocationTemplate {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
