// Object identifiers in dotted form. Ordering is lexicographic over arcs (SNMP walk order).

use crate::error::PollError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn from_arcs(arcs: Vec<u32>) -> Self {
        Self(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.len() > prefix.0.len() && self.0.starts_with(&prefix.0)
    }

    /// Sub-identifiers after `prefix`, dot-joined without a leading dot ("268501248.1").
    pub fn index_under(&self, prefix: &Oid) -> Option<String> {
        if !self.starts_with(prefix) {
            return None;
        }
        let parts: Vec<String> = self.0[prefix.0.len()..]
            .iter()
            .map(|a| a.to_string())
            .collect();
        Some(parts.join("."))
    }

    /// Last sub-identifier (slot / fan number).
    pub fn last_arc(&self) -> Option<u32> {
        self.0.last().copied()
    }
}

impl FromStr for Oid {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(PollError::parse(format!("empty oid '{s}'")));
        }
        let arcs = trimmed
            .split('.')
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|e| PollError::parse(format!("bad oid '{s}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if arcs.len() < 2 {
            return Err(PollError::parse(format!("oid '{s}' needs at least two arcs")));
        }
        Ok(Self(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.0 {
            write!(f, ".{arc}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    #[test]
    fn parses_with_and_without_leading_dot() {
        let a: Oid = ".1.3.6.1.2.1.1.3.0".parse().unwrap();
        let b: Oid = "1.3.6.1.2.1.1.3.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), ".1.3.6.1.2.1.1.3.0");
    }

    #[test]
    fn index_under_strips_table_prefix() {
        let base = oid(".1.3.6.1.4.1.3902.1082.500.10.2.3.3.1.2");
        let row = oid(".1.3.6.1.4.1.3902.1082.500.10.2.3.3.1.2.268501248.1");
        assert_eq!(row.index_under(&base).as_deref(), Some("268501248.1"));
        assert_eq!(base.index_under(&base), None);
        let sibling = oid(".1.3.6.1.4.1.3902.1082.500.10.2.3.3.1.20.5");
        assert_eq!(sibling.index_under(&base), None);
    }

    #[test]
    fn ordering_follows_walk_order() {
        assert!(oid("1.3.6.1.9") < oid("1.3.6.1.10"));
        assert!(oid("1.3.6.1") < oid("1.3.6.1.0"));
    }

    #[test]
    fn rejects_garbage() {
        assert!("1.3.x".parse::<Oid>().is_err());
        assert!("".parse::<Oid>().is_err());
    }
}
