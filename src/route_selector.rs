//! Resolves an inbound message to the integration route key that should
//! handle it.

use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_ROUTE: &str = "$default";

/// A compiled `$request.body.<path>` route-selection expression.
pub struct RouteSelector {
    path: Option<Vec<String>>,
}

impl RouteSelector {
    /// `expression` is the raw `routeSelectionExpression` config value, if
    /// any was configured. Anything not of the form `$request.body.<path>`
    /// is treated as "no expression configured" — the selector always
    /// returns `$default` in that case.
    pub fn new(expression: Option<&str>) -> Self {
        let path = expression.and_then(|expr| {
            expr.strip_prefix("$request.body.")
                .map(|rest| rest.split('.').map(str::to_owned).collect())
        });
        Self { path }
    }

    /// Choose a route key for an inbound message, given the integration
    /// table (so a resolved string terminal can be checked for presence).
    pub fn select(&self, message_text: &str, integrations: &HashMap<String, String>) -> String {
        let Some(path) = &self.path else {
            return DEFAULT_ROUTE.to_owned();
        };

        let Ok(parsed) = serde_json::from_str::<Value>(message_text) else {
            return DEFAULT_ROUTE.to_owned();
        };

        let mut current = &parsed;
        for segment in path {
            match current.as_object().and_then(|obj| obj.get(segment)) {
                Some(next) => current = next,
                None => return DEFAULT_ROUTE.to_owned(),
            }
        }

        match current {
            Value::String(s) if integrations.contains_key(s) => s.clone(),
            _ => DEFAULT_ROUTE.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrations() -> HashMap<String, String> {
        let mut m = HashMap::new();
        m.insert("$default".to_owned(), "http://x/default".to_owned());
        m.insert("join".to_owned(), "http://x/join".to_owned());
        m
    }

    #[test]
    fn no_expression_always_returns_default() {
        let selector = RouteSelector::new(None);
        assert_eq!(
            selector.select("{\"action\":\"join\"}", &integrations()),
            "$default"
        );
    }

    #[test]
    fn matches_string_terminal_present_in_integration_table() {
        let selector = RouteSelector::new(Some("$request.body.action"));
        assert_eq!(
            selector.select("{\"action\":\"join\",\"roomId\":\"123\"}", &integrations()),
            "join"
        );
    }

    #[test]
    fn falls_back_to_default_when_terminal_not_in_table() {
        let selector = RouteSelector::new(Some("$request.body.action"));
        assert_eq!(
            selector.select("{\"action\":\"leave\"}", &integrations()),
            "$default"
        );
    }

    #[test]
    fn falls_back_to_default_on_malformed_json() {
        let selector = RouteSelector::new(Some("$request.body.action"));
        assert_eq!(selector.select("not json", &integrations()), "$default");
    }

    #[test]
    fn falls_back_to_default_when_path_member_absent() {
        let selector = RouteSelector::new(Some("$request.body.action"));
        assert_eq!(selector.select("{\"other\":1}", &integrations()), "$default");
    }

    #[test]
    fn falls_back_to_default_when_intermediate_is_not_an_object() {
        let selector = RouteSelector::new(Some("$request.body.action.sub"));
        assert_eq!(
            selector.select("{\"action\":\"join\"}", &integrations()),
            "$default"
        );
    }

    #[test]
    fn non_string_terminals_never_match() {
        let selector = RouteSelector::new(Some("$request.body.action"));
        for msg in ["{\"action\":1}", "{\"action\":true}", "{\"action\":[1]}", "{\"action\":{}}"] {
            assert_eq!(selector.select(msg, &integrations()), "$default", "for {msg}");
        }
    }

    #[test]
    fn nested_path_resolves_through_multiple_members() {
        let selector = RouteSelector::new(Some("$request.body.meta.action"));
        assert_eq!(
            selector.select("{\"meta\":{\"action\":\"join\"}}", &integrations()),
            "join"
        );
    }
}
