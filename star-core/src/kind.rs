use serde::Serialize;

/// The part of a request a parameter model is bound from.
///
/// The declaration order here is also the order in which the binder runs
/// and the order in which parameters appear in the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Path,
    Query,
    Header,
    Cookie,
    Form,
    Body,
}

impl ParamKind {
    /// Every kind, in binding order.
    pub const ALL: [ParamKind; 6] = [
        ParamKind::Path,
        ParamKind::Query,
        ParamKind::Header,
        ParamKind::Cookie,
        ParamKind::Form,
        ParamKind::Body,
    ];

    /// The lowercase name used as the key of bound values and in error payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Path => "path",
            ParamKind::Query => "query",
            ParamKind::Header => "header",
            ParamKind::Cookie => "cookie",
            ParamKind::Form => "form",
            ParamKind::Body => "body",
        }
    }

    /// Whether fields of this kind are documented as OpenAPI parameter objects
    /// (as opposed to a request body).
    pub fn is_parameter(self) -> bool {
        matches!(
            self,
            ParamKind::Path | ParamKind::Query | ParamKind::Header | ParamKind::Cookie
        )
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
