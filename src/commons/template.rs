//! Expansion of `{placeholder}` templates.
//!
//! Used for installer command lines and for CRL distribution point URIs.
//! `{{` and `}}` stand for literal braces.

use std::fmt;


/// Expands all placeholders in `template` using `lookup`.
///
/// Fails on the first placeholder `lookup` doesn't know, and on unbalanced
/// braces.
pub fn expand<F>(template: &str, lookup: F) -> Result<String, TemplateError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut res = String::with_capacity(template.len());
    for token in tokens(template)? {
        match token {
            Token::Literal(s) => res.push_str(s),
            Token::Brace(c) => res.push(c),
            Token::Placeholder(name) => match lookup(name) {
                Some(value) => res.push_str(&value),
                None => {
                    return Err(TemplateError::Unknown(
                        template.to_string(), name.to_string()
                    ))
                }
            },
        }
    }
    Ok(res)
}

/// Returns the names of all placeholders used in `template`.
pub fn placeholders(template: &str) -> Result<Vec<&str>, TemplateError> {
    Ok(tokens(template)?
        .into_iter()
        .filter_map(|token| match token {
            Token::Placeholder(name) => Some(name),
            _ => None,
        })
        .collect())
}

/// Checks that `template` only uses placeholders from `known`.
pub fn verify(template: &str, known: &[&str]) -> Result<(), TemplateError> {
    for name in placeholders(template)? {
        if !known.contains(&name) {
            return Err(TemplateError::Unknown(
                template.to_string(), name.to_string()
            ));
        }
    }
    Ok(())
}

enum Token<'a> {
    Literal(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

fn tokens(template: &str) -> Result<Vec<Token<'_>>, TemplateError> {
    let mut res = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            res.push(Token::Literal(&rest[..pos]));
        }
        let brace = &rest[pos..pos + 1];
        let after = &rest[pos + 1..];

        if brace == "}" {
            if let Some(after) = after.strip_prefix('}') {
                res.push(Token::Brace('}'));
                rest = after;
                continue;
            }
            return Err(TemplateError::Unbalanced(template.to_string()));
        }

        if let Some(after) = after.strip_prefix('{') {
            res.push(Token::Brace('{'));
            rest = after;
            continue;
        }

        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                if name.is_empty() || name.contains('{') {
                    return Err(TemplateError::Unbalanced(template.to_string()));
                }
                res.push(Token::Placeholder(name));
                rest = &after[end + 1..];
            }
            None => {
                return Err(TemplateError::Unbalanced(template.to_string()))
            }
        }
    }
    if !rest.is_empty() {
        res.push(Token::Literal(rest));
    }
    Ok(res)
}


//------------ TemplateError -------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TemplateError {
    Unknown(String, String),
    Unbalanced(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateError::Unknown(template, name) => {
                write!(f, "unknown placeholder '{{{name}}}' in '{template}'")
            }
            TemplateError::Unbalanced(template) => {
                write!(f, "unbalanced braces in '{template}'")
            }
        }
    }
}

impl std::error::Error for TemplateError {}


//------------ Tests ---------------------------------------------------------
