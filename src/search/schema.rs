//! Index definition for chunk records.

use serde_json::{Value, json};

const VECTOR_ALGORITHM: &str = "hnsw";
const VECTOR_PROFILE: &str = "hnsw-profile";

/// Build the index definition matching [`super::IndexRecord`].
///
/// `analyzer` applies to the human-readable fields (`title`, `chunk`); `None` keeps the
/// service default.
pub fn index_definition(name: &str, dimension: usize, analyzer: Option<&str>) -> Value {
    let mut title = json!({
        "name": "title",
        "type": "Edm.String",
        "searchable": true,
    });
    let mut chunk = json!({
        "name": "chunk",
        "type": "Edm.String",
        "searchable": true,
        "sortable": false,
        "filterable": false,
        "facetable": false,
    });
    if let Some(analyzer) = analyzer {
        for field in [&mut title, &mut chunk] {
            if let Some(object) = field.as_object_mut() {
                object.insert("analyzer".into(), Value::String(analyzer.to_string()));
            }
        }
    }

    json!({
        "name": name,
        "fields": [
            { "name": "parent_id", "type": "Edm.String", "filterable": true },
            title,
            { "name": "url", "type": "Edm.String" },
            {
                "name": "chunk_id",
                "type": "Edm.String",
                "key": true,
                "searchable": true,
                "sortable": true,
                "filterable": true,
                "facetable": true,
                "analyzer": "keyword",
            },
            chunk,
            {
                "name": "text_vector",
                "type": "Collection(Edm.Single)",
                "searchable": true,
                "retrievable": true,
                "dimensions": dimension,
                "vectorSearchProfile": VECTOR_PROFILE,
            },
        ],
        "vectorSearch": {
            "algorithms": [{ "name": VECTOR_ALGORITHM, "kind": "hnsw" }],
            "profiles": [{ "name": VECTOR_PROFILE, "algorithm": VECTOR_ALGORITHM }],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field<'a>(definition: &'a Value, name: &str) -> &'a Value {
        definition["fields"]
            .as_array()
            .and_then(|fields| fields.iter().find(|field| field["name"] == name))
            .expect("field present")
    }

    #[test]
    fn chunk_id_is_the_keyword_key() {
        let definition = index_definition("docs", 1536, None);
        let key = field(&definition, "chunk_id");
        assert_eq!(key["key"], true);
        assert_eq!(key["analyzer"], "keyword");
    }

    #[test]
    fn vector_field_uses_configured_dimension() {
        let definition = index_definition("docs", 768, None);
        let vector = field(&definition, "text_vector");
        assert_eq!(vector["dimensions"], 768);
        assert_eq!(vector["vectorSearchProfile"], VECTOR_PROFILE);
    }

    #[test]
    fn analyzer_applies_to_text_fields_only() {
        let definition = index_definition("docs", 1536, Some("ja.microsoft"));
        assert_eq!(field(&definition, "title")["analyzer"], "ja.microsoft");
        assert_eq!(field(&definition, "chunk")["analyzer"], "ja.microsoft");
        assert!(field(&definition, "url").get("analyzer").is_none());
    }
}
