use serde::Deserialize;

use crate::error::CollectError;

/// The body clients POST to the collect endpoint.
///
/// Every field is optional at the parsing stage; the writer and aggregator
/// decide what is required. `experimentId` and `userId` also arrive under the
/// legacy snake_case names, and the stats window under `start`/`end`. The
/// canonical name wins whenever it is present and non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectRequest {
    pub action: Option<String>,
    #[serde(rename = "experimentId")]
    pub experiment_id: Option<String>,
    #[serde(rename = "experiment_id")]
    pub legacy_experiment_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "user_id")]
    pub legacy_user_id: Option<String>,
    pub variant: Option<String>,
    pub from: Option<String>,
    pub start: Option<String>,
    pub to: Option<String>,
    pub end: Option<String>,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

fn prefer<'a>(canonical: Option<&'a String>, legacy: Option<&'a String>) -> Option<&'a str> {
    non_empty(canonical).or_else(|| non_empty(legacy))
}

impl CollectRequest {
    /// Parse a raw request body. An empty body is treated as `{}`.
    pub fn from_slice(body: &[u8]) -> Result<Self, CollectError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(body)?)
    }

    pub fn action(&self) -> Option<&str> {
        non_empty(self.action.as_ref())
    }

    pub fn experiment_id(&self) -> Option<&str> {
        prefer(self.experiment_id.as_ref(), self.legacy_experiment_id.as_ref())
    }

    pub fn user_id(&self) -> Option<&str> {
        prefer(self.user_id.as_ref(), self.legacy_user_id.as_ref())
    }

    pub fn variant(&self) -> Option<&str> {
        non_empty(self.variant.as_ref())
    }

    pub fn window_from(&self) -> Option<&str> {
        prefer(self.from.as_ref(), self.start.as_ref())
    }

    pub fn window_to(&self) -> Option<&str> {
        prefer(self.to.as_ref(), self.end.as_ref())
    }
}
