//! `%(name)s` substitution for string values

use crate::domain::error::{DomainError, DomainResult};

/// Substitute `%(name)s` occurrences using `lookup`.
///
/// `%%` yields a single `%`; a `%` not followed by `(` or `%` is kept as is.
pub fn interpolate<F>(template: &str, lookup: F) -> DomainResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    if !template.contains('%') {
        return Ok(template.to_string());
    }
    let fail = |reason: String| DomainError::Interpolation {
        template: template.to_string(),
        reason,
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        if let Some(tail) = after.strip_prefix('%') {
            out.push('%');
            rest = tail;
        } else if let Some(tail) = after.strip_prefix('(') {
            let close = tail
                .find(')')
                .ok_or_else(|| fail("unclosed '%('".to_string()))?;
            let key = &tail[..close];
            let tail = tail[close + 1..]
                .strip_prefix('s')
                .ok_or_else(|| fail(format!("unsupported conversion after '%({})'", key)))?;
            let value = lookup(key).ok_or_else(|| fail(format!("unknown variable '{}'", key)))?;
            out.push_str(&value);
            rest = tail;
        } else {
            out.push('%');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}
