/// The keyword that names the subject of a prologue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Module,
    Program,
    Routine,
    Function,
    InternalRoutine,
    InternalFunction,
    /// `IIROUTINE`: an overloaded routine, labelled by every term after the first.
    OverloadedRoutine,
    ContainedRoutine,
}

impl Identity {
    pub fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "MODULE" => Some(Identity::Module),
            "PROGRAM" => Some(Identity::Program),
            "ROUTINE" => Some(Identity::Routine),
            "FUNCTION" => Some(Identity::Function),
            "IROUTINE" => Some(Identity::InternalRoutine),
            "IFUNCTION" => Some(Identity::InternalFunction),
            "IIROUTINE" => Some(Identity::OverloadedRoutine),
            "CROUTINE" => Some(Identity::ContainedRoutine),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Identity::Module => "MODULE",
            Identity::Program => "PROGRAM",
            Identity::Routine => "ROUTINE",
            Identity::Function => "FUNCTION",
            Identity::InternalRoutine => "IROUTINE",
            Identity::InternalFunction => "IFUNCTION",
            Identity::OverloadedRoutine => "IIROUTINE",
            Identity::ContainedRoutine => "CROUTINE",
        }
    }

    /// Short cross-reference label derived from the identity value, for the
    /// identities that carry one.
    pub fn short_label(self, value: &str) -> Option<String> {
        let mut terms = value.split_whitespace().skip(1);
        match self {
            Identity::InternalRoutine | Identity::InternalFunction | Identity::ContainedRoutine => {
                Some(terms.next().unwrap_or_default().to_string())
            }
            Identity::OverloadedRoutine => Some(terms.collect::<Vec<_>>().join(" ")),
            _ => None,
        }
    }
}
