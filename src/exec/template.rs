// src/exec/template.rs

//! `@NAME@` placeholder expansion for argument lists and path templates.
//!
//! Two kinds of substitution exist: scalar placeholders replace in-string,
//! and list placeholders splice a whole argument list in place of the one
//! argument that consists of nothing but the placeholder.

use anyhow::{Result, anyhow};
use regex::Regex;
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"@([A-Z_]+)@").expect("placeholder regex"))
}

fn whole_placeholder(arg: &str) -> Option<&str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^@([A-Z_]+)@$").expect("placeholder regex"));
    re.captures(arg).map(|c| c.get(1).map_or("", |m| m.as_str()))
}

/// Expand scalar placeholders inside one string.
///
/// `scalar` returns `None` for names it does not know; any such name in the
/// template is an error rather than silently passed through.
pub fn expand_string<F>(template: &str, scalar: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder_re().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let name = &caps[1];
        let value = scalar(name)
            .ok_or_else(|| anyhow!("unknown placeholder '@{name}@' in '{template}'"))?;
        out.push_str(&template[last..whole.start()]);
        out.push_str(&value);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

/// Expand an argument list.
///
/// An argument that is exactly one placeholder is first offered to `list`;
/// if it resolves, the returned items are spliced at that position.
/// Everything else goes through scalar expansion.
pub fn expand_args<F, G>(args: &[String], scalar: &F, list: &G) -> Result<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
    G: Fn(&str) -> Option<Vec<String>>,
{
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        if let Some(name) = whole_placeholder(arg) {
            if let Some(items) = list(name) {
                out.extend(items);
                continue;
            }
        }
        out.push(expand_string(arg, scalar)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(name: &str) -> Option<String> {
        match name {
            "INSTANCE" => Some("/data/foo.txt".to_string()),
            "REPETITION" => Some("0".to_string()),
            _ => None,
        }
    }

    fn list(name: &str) -> Option<Vec<String>> {
        (name == "EXTRA_ARGS").then(|| vec!["--fast".to_string(), "--small".to_string()])
    }

    #[test]
    fn scalar_placeholders_expand_in_place() {
        let args: Vec<String> = vec!["solve".into(), "--input=@INSTANCE@".into()];
        let out = expand_args(&args, &scalar, &list).unwrap();
        assert_eq!(out, vec!["solve", "--input=/data/foo.txt"]);
    }

    #[test]
    fn list_placeholder_splices() {
        let args: Vec<String> =
            vec!["solve".into(), "@EXTRA_ARGS@".into(), "@INSTANCE@".into()];
        let out = expand_args(&args, &scalar, &list).unwrap();
        assert_eq!(out, vec!["solve", "--fast", "--small", "/data/foo.txt"]);
    }

    #[test]
    fn list_placeholder_expanding_to_nothing_drops_the_argument() {
        let empty = |name: &str| (name == "EXTRA_ARGS").then(Vec::new);
        let args: Vec<String> = vec!["solve".into(), "@EXTRA_ARGS@".into()];
        let out = expand_args(&args, &scalar, &empty).unwrap();
        assert_eq!(out, vec!["solve"]);
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let args: Vec<String> = vec!["@BOGUS@".into()];
        assert!(expand_args(&args, &scalar, &list).is_err());
    }

    #[test]
    fn literal_text_passes_through() {
        assert_eq!(expand_string("a@b", &scalar).unwrap(), "a@b");
        assert_eq!(
            expand_string("run-@REPETITION@/@INSTANCE@", &scalar).unwrap(),
            "run-0//data/foo.txt"
        );
    }
}
