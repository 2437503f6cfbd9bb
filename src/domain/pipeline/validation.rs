//! Pipeline request validation

use super::request::PipelineRequest;

pub const MAX_QUERY_LENGTH: usize = 4000;
pub const MAX_HISTORY_TURNS: usize = 50;
pub const MAX_TOP_K: usize = 100;

/// Validate a request before any stage runs
pub fn validate_pipeline_request(request: &PipelineRequest) -> Result<(), String> {
    let query = request.query().trim();

    if query.is_empty() {
        return Err("Query cannot be empty".to_string());
    }

    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(format!(
            "Query cannot exceed {} characters",
            MAX_QUERY_LENGTH
        ));
    }

    if request.history().len() > MAX_HISTORY_TURNS {
        return Err(format!(
            "History cannot exceed {} turns",
            MAX_HISTORY_TURNS
        ));
    }

    let options = request.options();

    if let Some(top_k) = options.top_k {
        if top_k == 0 || top_k > MAX_TOP_K {
            return Err(format!("top_k must be between 1 and {}", MAX_TOP_K));
        }
    }

    if options.token_budget == Some(0) {
        return Err("token_budget must be greater than zero".to_string());
    }

    if options.watchdog_timeout_ms == Some(0) {
        return Err("watchdog_timeout_ms must be greater than zero".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::RequestOptions;

    #[test]
    fn test_valid_request() {
        assert!(validate_pipeline_request(&PipelineRequest::new("hello")).is_ok());
    }

    #[test]
    fn test_empty_query() {
        assert!(validate_pipeline_request(&PipelineRequest::new("   ")).is_err());
    }

    #[test]
    fn test_query_too_long() {
        let query = "a".repeat(MAX_QUERY_LENGTH + 1);
        assert!(validate_pipeline_request(&PipelineRequest::new(query)).is_err());
    }

    #[test]
    fn test_invalid_options() {
        let zero_top_k = PipelineRequest::new("q").with_options(RequestOptions::default().with_top_k(0));
        assert!(validate_pipeline_request(&zero_top_k).is_err());

        let zero_budget =
            PipelineRequest::new("q").with_options(RequestOptions::default().with_token_budget(0));
        assert!(validate_pipeline_request(&zero_budget).is_err());

        let zero_watchdog = PipelineRequest::new("q")
            .with_options(RequestOptions::default().with_watchdog_timeout_ms(0));
        assert!(validate_pipeline_request(&zero_watchdog).is_err());
    }
}
