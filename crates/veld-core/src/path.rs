use std::fmt;
use thiserror::Error as ThisError;

///
/// Data paths and relative pointers
///
/// Both codecs address positions inside a value with a sequence of path
/// components and emit `U#R` relative pointers when a shared mutable
/// container is re-encountered: walk `U` components up from the current
/// position, then follow the components of `R` downward. Components are
/// RFC-6901 escaped (`~0` = `~`, `~1` = `/`) so `/` can separate them.
///

///
/// PathError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PathError {
    #[error("invalid relative pointer: {0}")]
    BadPointer(String),

    #[error("invalid escape sequence in pointer component: {0}")]
    BadEscape(String),
}

/// Escape one path component per RFC 6901.
#[must_use]
pub fn escape(component: &str) -> String {
    component.replace('~', "~0").replace('/', "~1")
}

/// Unescape one RFC-6901 component.
pub fn unescape(component: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(component.len());
    let mut chars = component.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            other => {
                let mut bad = String::from("~");
                if let Some(o) = other {
                    bad.push(o);
                }
                return Err(PathError::BadEscape(bad));
            }
        }
    }
    Ok(out)
}

/// Join raw components into a canonical registry key (escaped, `/`-joined).
#[must_use]
pub fn join(components: &[String]) -> String {
    components
        .iter()
        .map(|c| escape(c))
        .collect::<Vec<_>>()
        .join("/")
}

///
/// RelativePointer
///
/// `U#R`: `U` components up from the current position, then follow the
/// components of `R`. An empty `R` addresses the ancestor itself.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelativePointer {
    pub up: usize,
    pub components: Vec<String>,
}

impl RelativePointer {
    /// Shortest pointer from `current` to `target` (shared common prefix).
    #[must_use]
    pub fn between(current: &[String], target: &[String]) -> Self {
        let common = current
            .iter()
            .zip(target.iter())
            .take_while(|(a, b)| a == b)
            .count();

        Self {
            up: current.len() - common,
            components: target[common..].to_vec(),
        }
    }

    /// Absolute components addressed from `current`, or `None` if the
    /// pointer climbs past the root.
    #[must_use]
    pub fn resolve(&self, current: &[String]) -> Option<Vec<String>> {
        let keep = current.len().checked_sub(self.up)?;
        let mut absolute = current[..keep].to_vec();
        absolute.extend(self.components.iter().cloned());
        Some(absolute)
    }

    /// Parse the `U#R` surface form.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        let Some((up, rest)) = text.split_once('#') else {
            return Err(PathError::BadPointer(text.to_string()));
        };
        if up.is_empty() || !up.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::BadPointer(text.to_string()));
        }
        let up: usize = up
            .parse()
            .map_err(|_| PathError::BadPointer(text.to_string()))?;

        let components = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').map(unescape).collect::<Result<_, _>>()?
        };

        Ok(Self { up, components })
    }
}

impl fmt::Display for RelativePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#", self.up)?;
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", escape(component))?;
        }
        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(parts: &[&str]) -> Vec<String> {
        parts.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn escape_round_trips() {
        for raw in ["plain", "a/b", "x~y", "~1", "", "a~0/b"] {
            assert_eq!(unescape(&escape(raw)).unwrap(), raw);
        }
    }

    #[test]
    fn unescape_rejects_dangling_tilde() {
        assert!(unescape("~").is_err());
        assert!(unescape("a~2b").is_err());
    }

    #[test]
    fn pointer_between_sibling_fields() {
        let pointer = RelativePointer::between(&steps(&[".b"]), &steps(&[".a"]));
        assert_eq!(pointer.up, 1);
        assert_eq!(pointer.to_string(), "1#.a");
    }

    #[test]
    fn pointer_to_enclosing_ancestor_is_bare() {
        let current = steps(&["value", "next", "0", "value", "next"]);
        let target = steps(&["value", "next"]);
        let pointer = RelativePointer::between(&current, &target);
        assert_eq!(pointer.up, 3);
        assert!(pointer.components.is_empty());
        assert_eq!(pointer.to_string(), "3#");
    }

    #[test]
    fn pointer_parse_inverts_display() {
        for text in ["1#.a", "3#", "0#a/b", "2#a~1b/c~0d"] {
            let pointer = RelativePointer::parse(text).unwrap();
            assert_eq!(pointer.to_string(), text);
        }
    }

    #[test]
    fn pointer_parse_rejects_garbage() {
        for text in ["", "#", "x#a", "-1#a", "1"] {
            assert!(RelativePointer::parse(text).is_err(), "{text}");
        }
    }

    #[test]
    fn resolve_walks_up_then_down() {
        let pointer = RelativePointer::parse("1#.a").unwrap();
        let absolute = pointer.resolve(&steps(&[".b"])).unwrap();
        assert_eq!(absolute, steps(&[".a"]));

        let overshoot = RelativePointer::parse("2#").unwrap();
        assert!(overshoot.resolve(&steps(&[".b"])).is_none());
    }
}
