use crate::error::ApiError;
use crate::params::Params;
use std::fmt;

/// A page, named either by title or by numeric page id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageRef {
    Title(String),
    Id(u64),
}

impl PageRef {
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        PageRef::Title(title.into())
    }

    #[must_use]
    pub fn id(id: u64) -> Self {
        PageRef::Id(id)
    }

    /// Build a reference from optional inputs; exactly one must be present.
    ///
    /// # Errors
    /// `MissingParameter` when neither is given, `ParamMix` when both are.
    pub fn from_parts(title: Option<&str>, id: Option<u64>) -> Result<Self, ApiError> {
        match (title, id) {
            (Some(title), None) => Ok(PageRef::title(title)),
            (None, Some(id)) => Ok(PageRef::Id(id)),
            (None, None) => Err(ApiError::MissingParameter("page or pageid")),
            (Some(_), Some(_)) => Err(ApiError::ParamMix(
                "both a page title and a page id were given".to_owned(),
            )),
        }
    }

    /// Set `title_key` or `id_key` in `params`, removing the other one.
    pub(crate) fn apply_to(&self, params: &mut Params, title_key: &str, id_key: &str) {
        match self {
            PageRef::Title(title) => {
                params.remove(id_key);
                params.set(title_key, title.as_str());
            }
            PageRef::Id(id) => {
                params.remove(title_key);
                params.set(id_key, *id);
            }
        }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRef::Title(title) => f.write_str(title),
            PageRef::Id(id) => write!(f, "page id {id}"),
        }
    }
}

impl From<&str> for PageRef {
    fn from(title: &str) -> Self {
        PageRef::title(title)
    }
}

impl From<String> for PageRef {
    fn from(title: String) -> Self {
        PageRef::Title(title)
    }
}

impl From<u64> for PageRef {
    fn from(id: u64) -> Self {
        PageRef::Id(id)
    }
}
