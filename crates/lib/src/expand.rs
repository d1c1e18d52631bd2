//! Variable expansion for download URLs, output filenames and packager environments.
//!
//! An [`Expander`] is a mutable set of named variables. Templates reference
//! them in two forms:
//!
//! - `${NAME}` - braced form, the name runs up to the next `}`
//! - `$NAME` - short form, the name is the longest run of `[A-Za-z0-9_]`
//!
//! The grammar is the one POSIX shells and Go's `os.Expand` use, so existing
//! package configurations render the same way. A single digit or one of
//! `*#$@!?-` after `$` is a one-character name (`$1x` is `$1` then `x`).
//! Unknown variables expand to the empty string. A `$` that starts no name is
//! kept as-is. Malformed braces are dropped: `${}` disappears and an
//! unterminated `${NAME` renders as `NAME`.
//!
//! # Example
//!
//! ```
//! use nfpm_helper_lib::expand::Expander;
//!
//! let mut vars = Expander::new();
//! vars.set("NAME", "foo");
//! vars.set("ARCH", "amd64");
//! assert_eq!(vars.expand("${NAME}_$ARCH.tar.gz"), "foo_amd64.tar.gz");
//! assert_eq!(vars.expand("${MISSING}-x"), "-x");
//! ```

use std::collections::BTreeMap;

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text.
  Literal(String),

  /// A variable reference, by name.
  Variable(String),
}

/// Parse a template into literal and variable segments.
///
/// Parsing never fails; malformed references degrade to literal text or are
/// dropped.
pub fn parse(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    literal.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if after.is_empty() {
      literal.push('$');
      rest = after;
      break;
    }

    let (name, width) = reference(after);
    if !name.is_empty() {
      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Variable(name.to_string()));
    } else if width == 0 {
      literal.push('$');
    }
    rest = &after[width..];
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  segments
}

fn is_special(b: u8) -> bool {
  matches!(b, b'*' | b'#' | b'$' | b'@' | b'!' | b'?' | b'-') || b.is_ascii_digit()
}

/// Read the name following a `$`. Returns the name and how many bytes it
/// consumed; an empty name with a non-zero width is malformed syntax.
fn reference(s: &str) -> (&str, usize) {
  let bytes = s.as_bytes();

  if bytes[0] == b'{' {
    if bytes.len() > 2 && is_special(bytes[1]) && bytes[2] == b'}' {
      return (&s[1..2], 3);
    }
    return match s[1..].find('}') {
      Some(0) => ("", 2),
      Some(end) => (&s[1..end + 1], end + 2),
      None => ("", 1),
    };
  }

  if is_special(bytes[0]) {
    return (&s[..1], 1);
  }

  let len = bytes
    .iter()
    .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
    .count();
  (&s[..len], len)
}

/// Expand a template, looking up each variable through `lookup`.
///
/// Variables for which `lookup` returns `None` expand to the empty string.
pub fn expand_with<F>(template: &str, lookup: F) -> String
where
  F: Fn(&str) -> Option<String>,
{
  let mut result = String::with_capacity(template.len());

  for segment in parse(template) {
    match segment {
      Segment::Literal(text) => result.push_str(&text),
      Segment::Variable(name) => {
        if let Some(value) = lookup(&name) {
          result.push_str(&value);
        }
      }
    }
  }

  result
}

/// Expand a template against the process environment.
pub fn expand_env(template: &str) -> String {
  expand_with(template, |name| std::env::var(name).ok())
}

/// A named-variable store used to render templates.
///
/// Cloning produces an independent copy, which is how phase-local variables
/// (download, packaging) are kept out of the shared base set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expander {
  vars: BTreeMap<String, String>,
}

impl Expander {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert or overwrite a variable.
  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
    self.vars.insert(name.into(), value.into());
  }

  /// Insert or overwrite every variable in `vars`.
  pub fn extend<I, K, V>(&mut self, vars: I)
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    for (name, value) in vars {
      self.set(name, value);
    }
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  /// Replace every `${NAME}` / `$NAME` reference with its current value.
  pub fn expand(&self, template: &str) -> String {
    expand_with(template, |name| self.vars.get(name).cloned())
  }

  /// Iterate over the stored variables.
  pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
    self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  /// Render the variables as `NAME=VALUE` environment entries.
  pub fn environ(&self) -> Vec<String> {
    self.vars.iter().map(|(k, v)| format!("{k}={v}")).collect()
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }
}
