//! Shared domain models.

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::format::{format_name, Region};

/// A game entry as stored in the bundled catalog and the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Raw file name, possibly carrying a region tag and `.iso` extension.
    #[serde(rename = "nome", alias = "name")]
    pub name: String,
    /// Image size in gigabytes.
    #[serde(rename = "tamanho_gb", alias = "size_gb", default)]
    pub size_gb: f64,
    /// Disc serial codes (e.g. `SLUS-20946`).
    #[serde(
        rename = "codigos",
        alias = "codes",
        default,
        deserialize_with = "codes_from_any",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub codes: Vec<String>,
    /// Free-text description.
    #[serde(
        rename = "descricao",
        alias = "description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Cover image URL.
    #[serde(
        rename = "capa_url",
        alias = "cover_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_url: Option<String>,
}

impl GameRecord {
    /// First identifying code, upper-cased.
    pub fn primary_code(&self) -> Option<String> {
        self.codes
            .first()
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty())
    }
}

/// Accept `codigos` as a list, a single string, or null.
fn codes_from_any<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Codes {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Codes>::deserialize(deserializer)? {
        Some(Codes::One(code)) if code.trim().is_empty() => Vec::new(),
        Some(Codes::One(code)) => vec![code],
        Some(Codes::Many(codes)) => codes,
        None => Vec::new(),
    })
}

/// A game document fetched from the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteGame {
    /// Server-assigned document id.
    pub id: String,
    /// The document fields.
    pub record: GameRecord,
}

/// Where a processed game came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameSource {
    /// Compiled-in catalog.
    Bundled,
    /// Remote store document.
    Remote,
}

/// A record plus the fields derived from its raw name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedGame {
    /// The underlying record.
    pub record: GameRecord,
    /// Name with region tag and extension removed.
    pub display_name: String,
    /// Region parsed from the tag, if any.
    pub region: Option<Region>,
    /// Lower-cased display name used for searching.
    pub search_key: String,
    /// Origin of the record.
    pub source: GameSource,
    /// Remote document id, when the record came from the store.
    pub remote_id: Option<String>,
}

impl ProcessedGame {
    /// Derive display fields from a bundled record.
    pub fn bundled(record: GameRecord) -> Self {
        Self::build(record, GameSource::Bundled, None)
    }

    /// Derive display fields from a remote document.
    pub fn remote(game: RemoteGame) -> Self {
        Self::build(game.record, GameSource::Remote, Some(game.id))
    }

    fn build(record: GameRecord, source: GameSource, remote_id: Option<String>) -> Self {
        let (display_name, region) = format_name(&record.name);
        let search_key = display_name.to_lowercase();
        Self {
            record,
            display_name,
            region,
            search_key,
            source,
            remote_id,
        }
    }

    /// Size in gigabytes.
    pub fn size_gb(&self) -> f64 {
        self.record.size_gb
    }

    /// Flag glyph, or an empty string when the region is unknown.
    pub fn flag(&self) -> &'static str {
        self.region.map(Region::flag).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_accept_string_or_list() -> anyhow::Result<()> {
        let single: GameRecord =
            serde_json::from_str(r#"{"nome":"A","tamanho_gb":1.5,"codigos":"slus-1"}"#)?;
        assert_eq!(single.codes, vec!["slus-1".to_string()]);
        assert_eq!(single.primary_code().as_deref(), Some("SLUS-1"));

        let many: GameRecord =
            serde_json::from_str(r#"{"nome":"B","tamanho_gb":2,"codigos":["X","Y"]}"#)?;
        assert_eq!(many.codes.len(), 2);
        assert_eq!(many.size_gb, 2.0);

        let none: GameRecord = serde_json::from_str(r#"{"nome":"C","tamanho_gb":3}"#)?;
        assert!(none.codes.is_empty());
        assert_eq!(none.primary_code(), None);
        Ok(())
    }

    #[test]
    fn processing_derives_display_fields() {
        let game = ProcessedGame::remote(RemoteGame {
            id: "doc1".to_string(),
            record: GameRecord {
                name: "Shadow of the Colossus (USA).iso".to_string(),
                size_gb: 3.2,
                codes: Vec::new(),
                description: None,
                cover_url: None,
            },
        });
        assert_eq!(game.display_name, "Shadow of the Colossus");
        assert_eq!(game.search_key, "shadow of the colossus");
        assert_eq!(game.flag(), "🇺🇸");
        assert_eq!(game.source, GameSource::Remote);
        assert_eq!(game.remote_id.as_deref(), Some("doc1"));
    }
}
