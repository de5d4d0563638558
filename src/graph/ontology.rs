//! Ontology: the schema of allowed entity types and relation triples.
//!
//! Loaded once from a JSON document with top-level `entities` and
//! `relations` maps, read-only afterwards, and shared by the graph
//! store and extraction filters. Type resolution is alias-aware and
//! case-insensitive; anything unresolvable is reported as unknown so
//! callers drop it rather than guess.

use indexmap::IndexMap;

use crate::core::{EvidenceRagError, Result};

/// Definition of one entity type.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct EntityTypeDef {
    /// Alternative names resolving to this type
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Definition of one relation type with its domain/range constraint.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RelationTypeDef {
    /// Entity types allowed as the subject
    #[serde(default)]
    pub domain: Vec<String>,
    /// Entity types allowed as the object
    #[serde(default)]
    pub range: Vec<String>,
}

/// Parsed, read-only ontology document.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Ontology {
    /// Entity type name -> definition
    #[serde(default)]
    pub entities: IndexMap<String, EntityTypeDef>,
    /// Relation type name -> domain/range definition
    #[serde(default)]
    pub relations: IndexMap<String, RelationTypeDef>,
}

impl Ontology {
    /// Parse an ontology from its JSON document form.
    pub fn from_json(json: &str) -> Result<Self> {
        let ontology: Ontology = serde_json::from_str(json)?;
        if ontology.entities.is_empty() {
            return Err(EvidenceRagError::Validation {
                message: "ontology declares no entity types".to_string(),
            });
        }
        Ok(ontology)
    }

    /// Canonical entity type names.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Relation type names.
    pub fn relation_types(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    /// Definition for an entity type, by canonical name.
    pub fn entity_info(&self, entity_type: &str) -> Option<&EntityTypeDef> {
        self.entities.get(entity_type)
    }

    /// Definition for a relation type.
    pub fn relation_info(&self, relation_type: &str) -> Option<&RelationTypeDef> {
        self.relations.get(relation_type)
    }

    /// Resolve a name or alias to a canonical entity type name,
    /// case-insensitively. Canonical names win over aliases. Returns
    /// `None` when nothing matches.
    pub fn resolve_entity_type(&self, name_or_alias: &str) -> Option<&str> {
        let needle = name_or_alias.to_lowercase();
        for (etype, info) in &self.entities {
            if etype.to_lowercase() == needle {
                return Some(etype);
            }
            if info.aliases.iter().any(|a| a.to_lowercase() == needle) {
                return Some(etype);
            }
        }
        None
    }

    /// Whether `(subject_type, relation_type, object_type)` is permitted
    /// by the relation's domain/range table.
    pub fn validate_relation(
        &self,
        subject_type: &str,
        relation_type: &str,
        object_type: &str,
    ) -> bool {
        let Some(rel) = self.relations.get(relation_type) else {
            return false;
        };
        rel.domain.iter().any(|t| t == subject_type) && rel.range.iter().any(|t| t == object_type)
    }
}

/// A candidate entity produced by an (external) extraction step, before
/// ontology filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateEntity {
    /// Extracted entity name
    pub name: String,
    /// Extracted type, possibly an alias or mis-cased
    pub entity_type: String,
}

/// A candidate relation triple before ontology filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRelation {
    /// Subject entity type
    pub subject_type: String,
    /// Relation type
    pub relation_type: String,
    /// Object entity type
    pub object_type: String,
}

/// Keep only candidates whose type resolves against the ontology,
/// rewriting the type to its canonical name. Unresolvable candidates
/// are dropped, not guessed at.
pub fn filter_entities(candidates: Vec<CandidateEntity>, ontology: &Ontology) -> Vec<CandidateEntity> {
    candidates
        .into_iter()
        .filter_map(|mut candidate| {
            let resolved = ontology.resolve_entity_type(&candidate.entity_type)?;
            candidate.entity_type = resolved.to_string();
            Some(candidate)
        })
        .collect()
}

/// Keep only relation candidates whose full triple is valid per the
/// ontology's domain/range table.
pub fn filter_relations(
    candidates: Vec<CandidateRelation>,
    ontology: &Ontology,
) -> Vec<CandidateRelation> {
    candidates
        .into_iter()
        .filter(|c| ontology.validate_relation(&c.subject_type, &c.relation_type, &c.object_type))
        .collect()
}
