use std::fmt;

///
/// Location
///
/// Source position carried by every IR node: file name plus 1-based
/// line and column. Locations ride along for diagnostics only; they
/// never affect semantics or equality of the surrounding node.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Location {
    #[must_use]
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

///
/// Label
///
/// Loop label: the surface name, the resolver-assigned number, and the
/// location of the loop that introduced it. Break/Continue reference
/// labels by name + number, so shadowed names stay unambiguous.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Label {
    pub name: String,
    pub id: u32,
    pub location: Location,
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_displays_as_file_line_column() {
        let location = Location::new("model.vd", 3, 14);
        assert_eq!(location.to_string(), "model.vd:3:14");
    }
}
