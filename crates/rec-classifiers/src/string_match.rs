//! Memorize mention -> label from the user's annotations and suggest it wherever the mention recurs.

use async_trait::async_trait;
use rec_types::{
    Annotation, Classifier, ClassifierError, Document, Metadata, ModelBlob, TrainingJob,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
struct StringMatchModel {
    /// Lowercased mention -> most frequent label.
    mentions: BTreeMap<String, String>,
}

pub struct StringMatchClassifier;

impl StringMatchClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StringMatchClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Byte ranges of alphanumeric runs.
fn tokens(text: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_alphanumeric(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, text.len()));
    }
    out
}

fn words(text: &str) -> Vec<String> {
    tokens(text)
        .into_iter()
        .map(|(b, e)| text[b..e].to_lowercase())
        .collect()
}

#[async_trait]
impl Classifier for StringMatchClassifier {
    async fn fit(&self, job: &TrainingJob) -> Result<Option<ModelBlob>, ClassifierError> {
        let layer = &job.metadata.layer;
        let mut counts: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();
        for document in &job.documents {
            for annotation in document.select(layer).filter(|a| !a.is_prediction) {
                let label = match annotation.label.as_deref() {
                    Some(l) if !l.is_empty() => l,
                    _ => continue,
                };
                let mention = match document.covered_text(annotation) {
                    Some(t) => words(t).join(" "),
                    None => continue,
                };
                if mention.is_empty() {
                    continue;
                }
                *counts
                    .entry(mention)
                    .or_default()
                    .entry(label.to_string())
                    .or_default() += 1;
            }
        }

        let mentions = counts
            .into_iter()
            .filter_map(|(mention, labels)| {
                labels
                    .into_iter()
                    .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                    .map(|(label, _)| (mention, label))
            })
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(
            user_id = %job.key.user_id(),
            mentions = mentions.len(),
            "string match training finished"
        );
        ModelBlob::encode(&StringMatchModel { mentions }).map(Some)
    }

    async fn predict(
        &self,
        metadata: &Metadata,
        model: Option<&ModelBlob>,
        document: &mut Document,
    ) -> Result<(), ClassifierError> {
        let model: StringMatchModel = match model {
            Some(blob) => blob.decode()?,
            None => return Ok(()),
        };

        let mut by_first_word: HashMap<String, Vec<(Vec<String>, &str)>> = HashMap::new();
        for (mention, label) in &model.mentions {
            let ws: Vec<String> = mention.split(' ').map(str::to_string).collect();
            if let Some(first) = ws.first().cloned() {
                by_first_word
                    .entry(first)
                    .or_default()
                    .push((ws, label.as_str()));
            }
        }

        let spans = tokens(&document.text);
        let lowered: Vec<String> = spans
            .iter()
            .map(|&(b, e)| document.text[b..e].to_lowercase())
            .collect();

        let mut predictions = Vec::new();
        for i in 0..spans.len() {
            let Some(candidates) = by_first_word.get(&lowered[i]) else {
                continue;
            };
            for (ws, label) in candidates {
                let end = i + ws.len();
                if end <= spans.len() && lowered[i..end] == ws[..] {
                    let prediction =
                        Annotation::prediction(&metadata.layer, spans[i].0, spans[end - 1].1, label);
                    if !predictions.contains(&prediction) {
                        predictions.push(prediction);
                    }
                }
            }
        }

        tracing::debug!(
            document_id = %document.document_id,
            predictions = predictions.len(),
            "string match prediction finished"
        );
        document.annotations.extend(predictions);
        Ok(())
    }
}
