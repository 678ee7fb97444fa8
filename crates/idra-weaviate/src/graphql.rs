//! Hybrid query construction and response decoding for the GraphQL endpoint.

use serde_json::Value;

use idra_core::{Error, HybridQuery, Result, SearchHit};

/// Escape a string for inclusion in a GraphQL double-quoted literal.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("\"{}\"", escape(i))).collect();
    format!("[{}]", quoted.join(", "))
}

fn vector_literal(vector: &[f32]) -> String {
    // serde_json renders a bare float list, which is valid GraphQL.
    serde_json::to_string(vector).unwrap_or_else(|_| "[]".to_string())
}

/// Render the GraphQL query string for a hybrid search.
///
/// Text present: a `hybrid` clause with alpha weighting, the lexical
/// property restriction, and the image vector folded in when present.
/// Vector only: a `nearVector` clause.
pub fn build_query(query: &HybridQuery) -> Result<String> {
    let search_clause = match (&query.query_text, &query.vector) {
        (Some(text), vector) => {
            let mut parts = vec![
                format!("query: \"{}\"", escape(text)),
                format!("alpha: {}", query.alpha),
            ];
            if !query.query_properties.is_empty() {
                parts.push(format!("properties: {}", quoted_list(&query.query_properties)));
            }
            if let Some(v) = vector {
                parts.push(format!("vector: {}", vector_literal(v)));
            }
            format!("hybrid: {{{}}}", parts.join(", "))
        }
        (None, Some(v)) => format!("nearVector: {{vector: {}}}", vector_literal(v)),
        (None, None) => {
            return Err(Error::InvalidInput(
                "hybrid query needs text or a vector".to_string(),
            ))
        }
    };

    let fields = query.return_properties.join("\n          ");
    Ok(format!(
        "{{\n  Get {{\n    {collection}(limit: {limit}, {search}) {{\n          {fields}\n          _additional {{ score }}\n    }}\n  }}\n}}",
        collection = query.collection,
        limit = query.limit,
        search = search_clause,
        fields = fields,
    ))
}

/// The store reports scores as strings on `_additional`; tolerate numbers
/// too.
fn parse_score(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|f| f as f32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Decode a GraphQL response body into hits, store order preserved.
pub fn decode_response(body: &Value, collection: &str) -> Result<Vec<SearchHit>> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::SearchBackend(format!("graphql errors: {}", message)));
        }
    }

    let objects = body
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(collection))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::SearchBackend(format!("missing data.Get.{} in response", collection))
        })?;

    let hits = objects
        .iter()
        .filter_map(Value::as_object)
        .map(|obj| {
            let score = obj
                .get("_additional")
                .and_then(|a| a.get("score"))
                .and_then(parse_score);

            let properties = obj
                .iter()
                .filter(|(key, _)| key.as_str() != "_additional")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            SearchHit { properties, score }
        })
        .collect();

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query() -> HybridQuery {
        HybridQuery {
            collection: "TechnicalDocuments".into(),
            query_text: Some("schema idraulico".into()),
            vector: None,
            query_properties: vec!["name".into(), "caption".into()],
            return_properties: vec![
                "name".into(),
                "source_pdf".into(),
                "page_index".into(),
                "mediaType".into(),
            ],
            alpha: 0.8,
            limit: 10,
        }
    }

    #[test]
    fn test_build_query_hybrid_clause() {
        let rendered = build_query(&query()).unwrap();
        assert!(rendered.contains("TechnicalDocuments(limit: 10,"));
        assert!(rendered.contains("hybrid: {query: \"schema idraulico\", alpha: 0.8, properties: [\"name\", \"caption\"]}"));
        assert!(rendered.contains("_additional { score }"));
        assert!(rendered.contains("source_pdf"));
    }

    #[test]
    fn test_build_query_folds_in_vector() {
        let mut q = query();
        q.vector = Some(vec![0.5, -1.0]);
        let rendered = build_query(&q).unwrap();
        assert!(rendered.contains("vector: [0.5,-1.0]"));
        assert!(rendered.contains("alpha: 0.8"));
    }

    #[test]
    fn test_build_query_vector_only_uses_near_vector() {
        let mut q = query();
        q.query_text = None;
        q.vector = Some(vec![1.0, 2.0]);
        let rendered = build_query(&q).unwrap();
        assert!(rendered.contains("nearVector: {vector: [1.0,2.0]}"));
        assert!(!rendered.contains("hybrid:"));
    }

    #[test]
    fn test_build_query_escapes_quotes() {
        let mut q = query();
        q.query_text = Some("flangia \"DN50\"".into());
        let rendered = build_query(&q).unwrap();
        assert!(rendered.contains("query: \"flangia \\\"DN50\\\"\""));
    }

    #[test]
    fn test_build_query_without_text_or_vector_fails() {
        let mut q = query();
        q.query_text = None;
        q.vector = None;
        assert!(matches!(
            build_query(&q).unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[test]
    fn test_decode_response_preserves_store_order() {
        let body = json!({
            "data": { "Get": { "TechnicalDocuments": [
                {
                    "name": "pompa",
                    "source_pdf": "catalogo.pdf",
                    "page_index": 3,
                    "mediaType": "image/png",
                    "_additional": { "score": "0.91" }
                },
                {
                    "name": "valvola",
                    "source_pdf": "catalogo.pdf",
                    "page_index": 7,
                    "mediaType": "image/png",
                    "_additional": { "score": 0.55 }
                }
            ]}}
        });

        let hits = decode_response(&body, "TechnicalDocuments").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].properties["name"], "pompa");
        assert_eq!(hits[0].score, Some(0.91));
        assert_eq!(hits[1].score, Some(0.55));
        assert!(!hits[0].properties.contains_key("_additional"));
    }

    #[test]
    fn test_decode_response_surfaces_graphql_errors() {
        let body = json!({
            "errors": [{ "message": "no such class" }],
        });
        let err = decode_response(&body, "TechnicalDocuments").unwrap_err();
        assert!(matches!(err, Error::SearchBackend(_)));
        assert!(err.to_string().contains("no such class"));
    }

    #[test]
    fn test_decode_response_missing_collection_is_backend_error() {
        let body = json!({ "data": { "Get": {} } });
        assert!(decode_response(&body, "TechnicalDocuments").is_err());
    }
}
