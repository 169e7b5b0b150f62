use std::env;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let service_name = non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone());
        let environment = non_empty("STAGE").unwrap_or_else(|| "unknown".to_string());

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn falls_back_to_component_and_unknown_stage() {
        let config = ObservabilityConfig::from_lookup(" backend ", |_| None);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.service_context.component, "backend");
    }

    #[test]
    fn reads_service_name_and_stage() {
        let vars = HashMap::from([
            ("SERVICE_NAME", "billing-bridge"),
            ("STAGE", "production"),
        ]);

        let config = ObservabilityConfig::from_lookup("backend", |key| {
            vars.get(key).map(|value| value.to_string())
        });

        assert_eq!(config.service_context.service_name, "billing-bridge");
        assert_eq!(config.service_context.environment, "production");
    }
}
