//! Engines available in every in-process driver.

use std::collections::BTreeMap;

use pipeline::{Annotation, Document, Typesystem};
use serde_json::json;

use crate::{AnalysisEngine, EngineError};

fn layer_parameter<'a>(parameters: &'a BTreeMap<String, String>, default: &'a str) -> &'a str {
    parameters
        .get("layer")
        .map(String::as_str)
        .filter(|layer| !layer.trim().is_empty())
        .unwrap_or(default)
}

fn typesystem_for(layer: &str, features: &[&str]) -> Typesystem {
    let body = json!({ "layers": { layer: { "features": features } } });
    Typesystem::new("application/json", body.to_string())
}

/// Marks every maximal run of non-whitespace characters.
///
/// Parameters: `layer` (default `token`), `min_length` in characters
/// (default 1).
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    pub const NAME: &'static str = "whitespace-tokenizer";
    const LAYER: &'static str = "token";
}

impl AnalysisEngine for WhitespaceTokenizer {
    fn typesystem(&self) -> Typesystem {
        typesystem_for(Self::LAYER, &["index"])
    }

    fn process(
        &mut self,
        document: &mut Document,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        let layer = layer_parameter(parameters, Self::LAYER).to_string();
        let min_length = match parameters.get("min_length") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| EngineError::InvalidParameter {
                name: "min_length".to_string(),
                message: e.to_string(),
            })?,
            None => 1,
        };

        let mut tokens = Vec::new();
        let mut start = None;
        for (offset, ch) in document.text.char_indices().chain(std::iter::once((document.text.len(), ' '))) {
            match (start, ch.is_whitespace()) {
                (None, false) => start = Some(offset),
                (Some(begin), true) => {
                    if document.text[begin..offset].chars().count() >= min_length {
                        tokens.push((begin, offset));
                    }
                    start = None;
                }
                _ => {}
            }
        }

        for (index, (begin, end)) in tokens.into_iter().enumerate() {
            document
                .annotations
                .push(Annotation::new(layer.clone(), begin, end).with_feature("index", index));
        }
        Ok(())
    }
}

/// Splits text into sentences at `.`, `!` or `?` followed by whitespace or the
/// end of the text. Leading whitespace is excluded from each sentence.
///
/// Parameters: `layer` (default `sentence`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SentenceSplitter;

impl SentenceSplitter {
    pub const NAME: &'static str = "sentence-splitter";
    const LAYER: &'static str = "sentence";
}

impl AnalysisEngine for SentenceSplitter {
    fn typesystem(&self) -> Typesystem {
        typesystem_for(Self::LAYER, &[])
    }

    fn process(
        &mut self,
        document: &mut Document,
        parameters: &BTreeMap<String, String>,
    ) -> Result<(), EngineError> {
        let layer = layer_parameter(parameters, Self::LAYER).to_string();
        let text = document.text.as_str();

        let mut spans = Vec::new();
        let mut begin = 0;
        let mut chars = text.char_indices().peekable();
        while let Some((offset, ch)) = chars.next() {
            let terminal = matches!(ch, '.' | '!' | '?');
            let boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if terminal && boundary {
                spans.push((begin, offset + ch.len_utf8()));
                begin = offset + ch.len_utf8();
            }
        }
        spans.push((begin, text.len()));

        for (begin, end) in spans {
            let slice = &text[begin..end];
            let trimmed = slice.trim_start();
            if trimmed.trim_end().is_empty() {
                continue;
            }
            let begin = begin + (slice.len() - trimmed.len());
            let end = begin + trimmed.trim_end().len();
            document.annotations.push(Annotation::new(layer.clone(), begin, end));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::DocumentId;

    fn doc(text: &str) -> Document {
        Document::new(DocumentId::new("d").unwrap(), text)
    }

    fn spans<'a>(document: &'a Document, layer: &'a str) -> Vec<&'a str> {
        document
            .layer(layer)
            .map(|a| &document.text[a.begin..a.end])
            .collect()
    }

    #[test]
    fn test_tokenizer_marks_runs_of_non_whitespace() {
        let mut d = doc("  Grüße aus\tBerlin \n");
        WhitespaceTokenizer.process(&mut d, &BTreeMap::new()).unwrap();
        assert_eq!(spans(&d, "token"), vec!["Grüße", "aus", "Berlin"]);
        assert_eq!(d.annotations[2].features["index"], 2);
    }

    #[test]
    fn test_tokenizer_honours_layer_and_min_length() {
        let mut d = doc("a bb ccc");
        let params = BTreeMap::from([
            ("layer".to_string(), "word".to_string()),
            ("min_length".to_string(), "2".to_string()),
        ]);
        WhitespaceTokenizer.process(&mut d, &params).unwrap();
        assert_eq!(spans(&d, "word"), vec!["bb", "ccc"]);
    }

    #[test]
    fn test_tokenizer_rejects_bad_min_length() {
        let mut d = doc("a b");
        let params = BTreeMap::from([("min_length".to_string(), "lots".to_string())]);
        let err = WhitespaceTokenizer.process(&mut d, &params).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { name, .. } if name == "min_length"));
    }

    #[test]
    fn test_splitter_finds_sentences() {
        let mut d = doc("Hello there. How are you?  Fine!Thanks. v1.2 works");
        SentenceSplitter.process(&mut d, &BTreeMap::new()).unwrap();
        assert_eq!(
            spans(&d, "sentence"),
            vec!["Hello there.", "How are you?", "Fine!Thanks.", "v1.2 works"]
        );
    }

    #[test]
    fn test_splitter_ignores_blank_text() {
        let mut d = doc("   ");
        SentenceSplitter.process(&mut d, &BTreeMap::new()).unwrap();
        assert!(d.annotations.is_empty());
    }
}
