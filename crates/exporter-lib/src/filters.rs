//! Inclusion filters applied to the topology before publishing
//!
//! Every filter admits everything when it is configured empty.

use crate::error::FilterError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Name of the deployments collector, as used in the collectors filter
pub const DEPLOYMENTS_COLLECTOR: &str = "Deployments";
/// Name of the service discovery collector, as used in the collectors filter
pub const SERVICE_DISCOVERY_COLLECTOR: &str = "ServiceDiscovery";

const KNOWN_COLLECTORS: &[&str] = &[DEPLOYMENTS_COLLECTOR, SERVICE_DISCOVERY_COLLECTOR];

/// Admits instances placed in one of the configured availability zones
#[derive(Debug, Clone, Default)]
pub struct AzsFilter {
    azs: HashSet<String>,
}

impl AzsFilter {
    pub fn new<I, S>(azs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let azs = azs
            .into_iter()
            .map(|az| az.as_ref().trim().to_string())
            .filter(|az| !az.is_empty())
            .collect();

        Self { azs }
    }

    pub fn enabled(&self, az: &str) -> bool {
        self.azs.is_empty() || self.azs.contains(az)
    }
}

/// Admits names matching any of the configured regular expressions
#[derive(Debug, Clone, Default)]
pub struct RegexpFilter {
    patterns: Vec<Regex>,
}

impl RegexpFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| FilterError::InvalidPattern { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(name))
    }
}

/// The pair of predicates a service discovery collector consults
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    azs: Arc<AzsFilter>,
    processes: Arc<RegexpFilter>,
}

impl FilterSet {
    pub fn new(azs: AzsFilter, processes: RegexpFilter) -> Self {
        Self {
            azs: Arc::new(azs),
            processes: Arc::new(processes),
        }
    }

    pub fn allows_az(&self, az: &str) -> bool {
        self.azs.enabled(az)
    }

    pub fn allows_process(&self, name: &str) -> bool {
        self.processes.enabled(name)
    }
}

/// Selects which collectors are registered with the orchestrator
#[derive(Debug, Clone, Default)]
pub struct CollectorsFilter {
    collectors: HashSet<String>,
}

impl CollectorsFilter {
    pub fn new<I, S>(collectors: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut enabled = HashSet::new();

        for collector in collectors {
            let collector = collector.as_ref().trim();
            if collector.is_empty() {
                continue;
            }
            if !KNOWN_COLLECTORS.contains(&collector) {
                return Err(FilterError::UnknownCollector(collector.to_string()));
            }
            enabled.insert(collector.to_string());
        }

        Ok(Self {
            collectors: enabled,
        })
    }

    pub fn enabled(&self, collector: &str) -> bool {
        self.collectors.is_empty() || self.collectors.contains(collector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_azs_filter_admits_everything() {
        let filter = AzsFilter::new(Vec::<String>::new());

        assert!(filter.enabled("z1"));
        assert!(filter.enabled(""));
    }

    #[test]
    fn test_azs_filter_requires_exact_match() {
        let filter = AzsFilter::new(["z1", " z2 "]);

        assert!(filter.enabled("z1"));
        assert!(filter.enabled("z2"));
        assert!(!filter.enabled("z12"));
        assert!(!filter.enabled(""));
    }

    #[test]
    fn test_azs_filter_ignores_blank_entries() {
        let filter = AzsFilter::new("".split(','));
        assert!(filter.enabled("anything"));
    }

    #[test]
    fn test_regexp_filter_matches_any_pattern() {
        let filter = RegexpFilter::new(["^node_", "exporter$"]).unwrap();

        assert!(filter.enabled("node_exporter"));
        assert!(filter.enabled("bosh_exporter"));
        assert!(!filter.enabled("gorouter"));
    }

    #[test]
    fn test_regexp_filter_is_unanchored() {
        let filter = RegexpFilter::new(["router"]).unwrap();
        assert!(filter.enabled("gorouter"));
    }

    #[test]
    fn test_regexp_filter_rejects_malformed_pattern() {
        let err = RegexpFilter::new(["valid", "(unclosed"]).unwrap_err();
        assert!(matches!(err, FilterError::InvalidPattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_default_filter_set_admits_everything() {
        let filters = FilterSet::default();

        assert!(filters.allows_az("z3"));
        assert!(filters.allows_process("anything"));
    }

    #[test]
    fn test_collectors_filter() {
        let all = CollectorsFilter::new(Vec::<&str>::new()).unwrap();
        assert!(all.enabled(DEPLOYMENTS_COLLECTOR));
        assert!(all.enabled(SERVICE_DISCOVERY_COLLECTOR));

        let only_sd = CollectorsFilter::new([SERVICE_DISCOVERY_COLLECTOR]).unwrap();
        assert!(only_sd.enabled(SERVICE_DISCOVERY_COLLECTOR));
        assert!(!only_sd.enabled(DEPLOYMENTS_COLLECTOR));

        assert!(matches!(
            CollectorsFilter::new(["Jobs"]),
            Err(FilterError::UnknownCollector(_))
        ));
    }
}
