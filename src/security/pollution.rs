//! HTTP parameter pollution protection.
//!
//! A name supplied more than once in the query string keeps only its last
//! value, unless the name is whitelisted, in which case every value is kept
//! in the order supplied.

use std::collections::BTreeSet;

use crate::config::ParameterPollutionConfig;
use crate::errors::PipelineError;
use crate::http::request::{ApiRequest, QueryMap, QueryValue};
use crate::pipeline::Stage;

/// Resolves multi-valued query parameters against a whitelist.
#[derive(Debug, Clone, Default)]
pub struct ParameterDeduplicator {
    whitelist: BTreeSet<String>,
}

impl ParameterDeduplicator {
    pub fn new(config: &ParameterPollutionConfig) -> Self {
        Self {
            whitelist: config.whitelist.clone(),
        }
    }

    pub fn is_whitelisted(&self, name: &str) -> bool {
        self.whitelist.contains(name)
    }

    pub fn dedupe(&self, query: QueryMap) -> QueryMap {
        query
            .into_iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    QueryValue::Many(values) if !self.is_whitelisted(&name) => {
                        tracing::debug!(param = %name, count = values.len(), "Collapsed polluted parameter");
                        QueryValue::Single(values.into_iter().last()?)
                    }
                    other => other,
                };
                Some((name, value))
            })
            .collect()
    }
}

impl Stage for ParameterDeduplicator {
    fn name(&self) -> &'static str {
        "dedupe_params"
    }

    fn apply(&self, mut request: ApiRequest) -> Result<ApiRequest, PipelineError> {
        let query = std::mem::take(&mut request.query);
        request.query = self.dedupe(query);
        Ok(request)
    }
}
