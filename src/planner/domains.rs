// src/planner/domains.rs — Metric prefix → clinical domain table
//
// Scoring targets are metric ids such as "C41.1a" or "I25". The leading
// letter selects the specialty. The table is explicit: an unknown prefix
// is a configuration error, never a silent "general" default.

use crate::infra::errors::ForgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainInfo {
    pub prefix: char,
    pub name: &'static str,
    pub archetype: &'static str,
}

pub const DOMAIN_TABLE: [DomainInfo; 10] = [
    DomainInfo {
        prefix: 'C',
        name: "Endocrinology",
        archetype: "USNWR_ENDO_METRIC",
    },
    DomainInfo {
        prefix: 'D',
        name: "Gastroenterology",
        archetype: "USNWR_GASTRO_METRIC",
    },
    DomainInfo {
        prefix: 'E',
        name: "Cardiology",
        archetype: "USNWR_CARDIO_METRIC",
    },
    DomainInfo {
        prefix: 'F',
        name: "Neonatology",
        archetype: "USNWR_NEO_METRIC",
    },
    DomainInfo {
        prefix: 'G',
        name: "Nephrology",
        archetype: "USNWR_NEPHRO_METRIC",
    },
    DomainInfo {
        prefix: 'H',
        name: "Neurology_Neurosurgery",
        archetype: "USNWR_NEURO_METRIC",
    },
    DomainInfo {
        prefix: 'I',
        name: "Orthopedics",
        archetype: "USNWR_ORTHO_METRIC",
    },
    DomainInfo {
        prefix: 'J',
        name: "Pulmonology",
        archetype: "USNWR_PULM_METRIC",
    },
    DomainInfo {
        prefix: 'K',
        name: "Urology",
        archetype: "USNWR_URO_METRIC",
    },
    DomainInfo {
        prefix: 'L',
        name: "Behavioral_Health",
        archetype: "USNWR_BH_METRIC",
    },
];

/// Resolve the clinical domain for a metric id by its leading letter.
pub fn resolve_domain(target_id: &str) -> Result<&'static DomainInfo, ForgeError> {
    let prefix = target_id
        .trim()
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase())
        .ok_or_else(|| ForgeError::config("empty target id"))?;

    DOMAIN_TABLE
        .iter()
        .find(|d| d.prefix == prefix)
        .ok_or_else(|| {
            ForgeError::config(format!(
                "target '{target_id}' has no domain mapping for prefix '{prefix}'"
            ))
        })
}
