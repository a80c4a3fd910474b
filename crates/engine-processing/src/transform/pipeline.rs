use crate::transform::{
    RecordTransformer, Transformed,
    error::TransformError,
    rules::{CaseRule, SkipIfEmpty, TrimRule},
};
use engine_config::settings::TransformRule;
use model::records::record::Record;
use std::sync::Arc;
use tracing::debug;

/// One step of a [`TransformPipeline`].
pub trait Transform: Send + Sync {
    fn apply(&self, record: Record) -> Result<Transformed, TransformError>;
}

/// Applies transforms in order, stopping at the first `Skip`.
#[derive(Clone)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self {
            transforms: Vec::new(),
        }
    }

    pub fn from_rules(rules: &[TransformRule]) -> Self {
        rules.iter().fold(Self::new(), |pipeline, rule| match rule {
            TransformRule::Uppercase { fields } => {
                pipeline.add_transform(CaseRule::upper(fields.clone()))
            }
            TransformRule::Lowercase { fields } => {
                pipeline.add_transform(CaseRule::lower(fields.clone()))
            }
            TransformRule::Trim { fields } => pipeline.add_transform(TrimRule::new(fields.clone())),
            TransformRule::SkipIfEmpty { field } => {
                pipeline.add_transform(SkipIfEmpty::new(field.clone()))
            }
        })
    }

    pub fn add_transform<T: Transform + 'static>(mut self, transform: T) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl RecordTransformer for TransformPipeline {
    fn transform(&self, record: &Record) -> Result<Transformed, TransformError> {
        let mut current = record.clone();
        for transform in &self.transforms {
            match transform.apply(current)? {
                Transformed::Emit(next) => current = next,
                Transformed::Skip => {
                    debug!("Skipping ({record})");
                    return Ok(Transformed::Skip);
                }
            }
        }

        debug!("Converting ({record}) into ({current})");
        Ok(Transformed::Emit(current))
    }
}

impl Default for TransformPipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::value::Value;

    fn person(first: &str, last: &str) -> Record {
        Record::from_pairs([("firstName", first), ("lastName", last)])
    }

    #[test]
    fn uppercases_all_fields_by_default() {
        let pipeline = TransformPipeline::from_rules(&[TransformRule::Uppercase { fields: vec![] }]);

        let out = pipeline.transform(&person("ann", "lee")).unwrap();
        assert_eq!(out, Transformed::Emit(person("ANN", "LEE")));
    }

    #[test]
    fn rules_apply_in_order_and_skip_short_circuits() {
        let pipeline = TransformPipeline::from_rules(&[
            TransformRule::Trim { fields: vec![] },
            TransformRule::SkipIfEmpty {
                field: "lastName".into(),
            },
            TransformRule::Uppercase {
                fields: vec!["firstName".into()],
            },
        ]);
        assert_eq!(pipeline.len(), 3);

        let out = pipeline.transform(&person("  bo ", " kim")).unwrap();
        assert_eq!(out, Transformed::Emit(person("BO", "kim")));

        let skipped = pipeline.transform(&person("cy", "   ")).unwrap();
        assert_eq!(skipped, Transformed::Skip);
    }

    #[test]
    fn input_record_is_untouched() {
        let pipeline = TransformPipeline::new().add_transform(CaseRule::upper(vec![]));
        let input = person("ann", "lee");

        pipeline.transform(&input).unwrap();
        assert_eq!(input.get("firstName"), Some(&Value::from("ann")));
    }

    #[test]
    fn empty_pipeline_is_identity() {
        let pipeline = TransformPipeline::default();
        assert!(pipeline.is_empty());
        assert_eq!(
            pipeline.transform(&person("a", "b")).unwrap(),
            Transformed::Emit(person("a", "b"))
        );
    }
}
