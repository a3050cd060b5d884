//! Go method-signature parsing
//!
//! Extracts receiver, parameter types, and return types from raw signature
//! strings like `func (r *Repo) FindUser(id string) (User, error)`. Used by
//! the cross-file method-association phase; failures are non-fatal warnings.
//!
//! Phase 1 of interface matching compares method-name sets only; keeping the
//! parsed counts and type lists here lets a later phase compare full
//! signatures without touching the matcher.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::shared::models::{GraphError, MethodSignature, Result};

/// `func (r *Repo) Name(params) returns` with `func` and the receiver name
/// both optional.
static METHOD_SIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:func\s*)?\(\s*(?:(?P<recv_name>[A-Za-z_]\w*)\s+)?(?P<recv_type>\*?[A-Za-z_][\w\.]*)\s*\)\s*(?P<name>[A-Za-z_]\w*)\s*\((?P<params>[^)]*)\)\s*(?P<returns>.*)$",
    )
    .expect("method signature regex is valid")
});

/// Plain function form: `func Name(params) returns`
static FUNC_SIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:func\s+)?(?P<name>[A-Za-z_]\w*)\s*\((?P<params>[^)]*)\)\s*(?P<returns>.*)$",
    )
    .expect("function signature regex is valid")
});

/// Parse a method signature string into its structured form
pub fn parse_method_signature(signature: &str) -> Result<MethodSignature> {
    if signature.trim().is_empty() {
        return Err(GraphError::MethodParseFailure(
            "empty signature".to_string(),
        ));
    }

    if let Some(caps) = METHOD_SIG.captures(signature) {
        let receiver = caps
            .name("recv_type")
            .map(|m| m.as_str().trim_start_matches('*').to_string());
        let name = caps["name"].to_string();
        let params = split_type_list(&caps["params"]);
        let returns = parse_returns(caps.name("returns").map_or("", |m| m.as_str()));
        return Ok(MethodSignature {
            param_count: params.len(),
            return_count: returns.len(),
            name,
            params,
            returns,
            receiver,
        });
    }

    if let Some(caps) = FUNC_SIG.captures(signature) {
        let name = caps["name"].to_string();
        let params = split_type_list(&caps["params"]);
        let returns = parse_returns(caps.name("returns").map_or("", |m| m.as_str()));
        return Ok(MethodSignature {
            param_count: params.len(),
            return_count: returns.len(),
            name,
            params,
            returns,
            receiver: None,
        });
    }

    Err(GraphError::MethodParseFailure(format!(
        "unparseable signature: {}",
        signature
    )))
}

/// Split a comma-separated parameter list, keeping only the type of each
/// `name Type` pair. Grouped parameters (`a, b int`) yield the shared type
/// for the bare names.
fn split_type_list(list: &str) -> Vec<String> {
    let trimmed = list.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let raw: Vec<&str> = trimmed.split(',').map(str::trim).collect();
    let mut types: Vec<String> = Vec::with_capacity(raw.len());
    // Walk right-to-left so grouped params inherit the type that follows them
    let mut pending_type: Option<String> = None;
    for part in raw.iter().rev() {
        let tokens: Vec<&str> = part.split_whitespace().collect();
        let ty = match tokens.len() {
            0 => continue,
            1 => match &pending_type {
                // Bare identifier in a group: `a` in `a, b int`
                Some(shared) if is_identifier(tokens[0]) => shared.clone(),
                _ => tokens[0].to_string(),
            },
            _ => tokens[1..].join(" "),
        };
        pending_type = Some(ty.clone());
        types.push(ty);
    }
    types.reverse();
    types
}

fn parse_returns(returns: &str) -> Vec<String> {
    let trimmed = returns.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|part| {
            // Named returns: `err error` keeps the type
            let tokens: Vec<&str> = part.split_whitespace().collect();
            if tokens.len() > 1 {
                tokens[1..].join(" ")
            } else {
                part.to_string()
            }
        })
        .collect()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_method_signature() {
        let sig = parse_method_signature("func (r *Repo) FindUser(id string) (User, error)")
            .unwrap();
        assert_eq!(sig.name, "FindUser");
        assert_eq!(sig.receiver.as_deref(), Some("Repo"));
        assert_eq!(sig.params, vec!["string"]);
        assert_eq!(sig.returns, vec!["User", "error"]);
        assert_eq!(sig.param_count, 1);
        assert_eq!(sig.return_count, 2);
    }

    #[test]
    fn test_method_without_func_keyword() {
        let sig = parse_method_signature("(s Store) Close() error").unwrap();
        assert_eq!(sig.name, "Close");
        assert_eq!(sig.receiver.as_deref(), Some("Store"));
        assert!(sig.params.is_empty());
        assert_eq!(sig.returns, vec!["error"]);
    }

    #[test]
    fn test_grouped_params() {
        let sig = parse_method_signature("func (c *Calc) Add(a, b int) int").unwrap();
        assert_eq!(sig.params, vec!["int", "int"]);
        assert_eq!(sig.param_count, 2);
        assert_eq!(sig.returns, vec!["int"]);
    }

    #[test]
    fn test_plain_function() {
        let sig = parse_method_signature("func Sum(xs []int) int").unwrap();
        assert_eq!(sig.name, "Sum");
        assert!(sig.receiver.is_none());
        assert_eq!(sig.params, vec!["[]int"]);
    }

    #[test]
    fn test_unparseable() {
        assert!(parse_method_signature("").is_err());
        assert!(parse_method_signature("not a signature at all !!!").is_err());
    }

    #[test]
    fn test_pointer_receiver_stripped() {
        let sig = parse_method_signature("func (q *queue.Worker) Run()").unwrap();
        assert_eq!(sig.receiver.as_deref(), Some("queue.Worker"));
        assert!(sig.returns.is_empty());
    }
}
