use std::fmt;

/// Kind of documentation region delimited by a begin/end marker pair.
/// Regions never nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Region {
    /// `BOI` / `EOI`: title page data and introductory text.
    Introduction,
    /// `BOP` / `EOP`
    Prologue,
    /// `BOPI` / `EOPI`: omitted in internal mode.
    InternalPrologue,
    /// `BOC` / `EOC`: verbatim source code.
    CodeBlock,
    /// `BOE` / `EOE`
    ExamplePrologue,
    /// `BOR` / `EOR`: comma-separated resource table rows.
    Resource,
}

/// Which side of a region a section marker sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Begin,
    End,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Introduction,
        Region::Prologue,
        Region::InternalPrologue,
        Region::CodeBlock,
        Region::ExamplePrologue,
        Region::Resource,
    ];

    pub fn begin_token(self) -> &'static str {
        match self {
            Region::Introduction => "BOI",
            Region::Prologue => "BOP",
            Region::InternalPrologue => "BOPI",
            Region::CodeBlock => "BOC",
            Region::ExamplePrologue => "BOE",
            Region::Resource => "BOR",
        }
    }

    pub fn end_token(self) -> &'static str {
        match self {
            Region::Introduction => "EOI",
            Region::Prologue => "EOP",
            Region::InternalPrologue => "EOPI",
            Region::CodeBlock => "EOC",
            Region::ExamplePrologue => "EOE",
            Region::Resource => "EOR",
        }
    }

    /// Resolve a bare section token such as `BOPI` (exact, case-sensitive).
    pub fn from_token(token: &str) -> Option<(Region, Boundary)> {
        Region::ALL.into_iter().find_map(|region| {
            if token == region.begin_token() {
                Some((region, Boundary::Begin))
            } else if token == region.end_token() {
                Some((region, Boundary::End))
            } else {
                None
            }
        })
    }

    /// Regions whose lines are split into keyword fields.
    pub fn has_keywords(self) -> bool {
        !matches!(self, Region::CodeBlock | Region::Resource)
    }

    /// Prologue, internal prologue and example prologue.
    pub fn is_prologue_family(self) -> bool {
        matches!(
            self,
            Region::Prologue | Region::InternalPrologue | Region::ExamplePrologue
        )
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Introduction => "introduction",
            Region::Prologue => "prologue",
            Region::InternalPrologue => "internal prologue",
            Region::CodeBlock => "code",
            Region::ExamplePrologue => "example",
            Region::Resource => "resource",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_resolve_exactly() {
        assert_eq!(
            Region::from_token("BOP"),
            Some((Region::Prologue, Boundary::Begin))
        );
        assert_eq!(
            Region::from_token("EOPI"),
            Some((Region::InternalPrologue, Boundary::End))
        );
        assert_eq!(Region::from_token("bop"), None);
        assert_eq!(Region::from_token("BOPX"), None);
    }

    #[test]
    fn every_region_round_trips_through_its_tokens() {
        for region in Region::ALL {
            assert_eq!(
                Region::from_token(region.begin_token()),
                Some((region, Boundary::Begin))
            );
            assert_eq!(
                Region::from_token(region.end_token()),
                Some((region, Boundary::End))
            );
        }
    }
}
