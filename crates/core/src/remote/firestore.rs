use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::{
    config::FirebaseConfig,
    error::StoreError,
    models::{GameRecord, RemoteGame},
};

use super::GameStore;

const PAGE_SIZE: &str = "300";
const MAX_ERROR_BODY: usize = 200;

/// Game store backed by the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreStore {
    client: Client,
    config: FirebaseConfig,
}

impl FirestoreStore {
    /// Build a store from configuration.
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn collection_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            self.config.firestore_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.collection
        )
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<Value, StoreError> {
        let mut request = self.client.get(self.collection_url()).query(&[
            ("key", self.config.api_key.as_str()),
            ("orderBy", "nome"),
            ("pageSize", PAGE_SIZE),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = request.send().await?;
        let response = check_status(response).await?;
        Ok(response.json::<Value>().await?)
    }
}

impl GameStore for FirestoreStore {
    async fn list_games(&self) -> Result<Vec<RemoteGame>, StoreError> {
        let mut games = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.fetch_page(page_token.as_deref()).await?;
            games.extend(decode_documents(&page)?);
            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        info!(count = games.len(), "Remote games fetched");
        Ok(games)
    }

    async fn add_game(&self, game: &GameRecord, id_token: &str) -> Result<String, StoreError> {
        if id_token.is_empty() {
            return Err(StoreError::Unauthenticated);
        }
        let response = self
            .client
            .post(self.collection_url())
            .query(&[("key", self.config.api_key.as_str())])
            .bearer_auth(id_token)
            .json(&encode_record(game))
            .send()
            .await?;
        let response = check_status(response).await?;
        let document = response.json::<Value>().await?;
        let id = document
            .get("name")
            .and_then(Value::as_str)
            .and_then(document_id)
            .ok_or_else(|| StoreError::Decode("created document has no name".to_string()))?;
        info!(%id, name = %game.name, "Game added to remote store");
        Ok(id)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|idx| body.is_char_boundary(*idx))
            .unwrap_or(0);
        body.truncate(cut);
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Last path segment of a document resource name.
pub fn document_id(name: &str) -> Option<String> {
    name.rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Decode a list response, skipping documents that cannot be shown.
pub fn decode_documents(page: &Value) -> Result<Vec<RemoteGame>, StoreError> {
    let documents = match page.get("documents") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(documents)) => documents,
        Some(_) => return Err(StoreError::Decode("documents is not a list".to_string())),
    };

    let mut games = Vec::with_capacity(documents.len());
    for document in documents {
        match decode_document(document) {
            Ok(game) => games.push(game),
            Err(err) => warn!("Skipping remote document: {err}"),
        }
    }
    Ok(games)
}

/// Coerce one document's field bag into a game.
pub fn decode_document(document: &Value) -> Result<RemoteGame, StoreError> {
    let id = document
        .get("name")
        .and_then(Value::as_str)
        .and_then(document_id)
        .ok_or_else(|| StoreError::Decode("document without name".to_string()))?;
    let empty = Map::new();
    let fields = document
        .get("fields")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let name = fields
        .get("nome")
        .and_then(string_value)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| StoreError::Decode(format!("document {id} has no name")))?;
    let size_gb = fields.get("tamanho_gb").and_then(number_value).unwrap_or(0.0);
    let codes = fields.get("codigos").map(string_list).unwrap_or_default();
    let description = fields
        .get("descricao")
        .and_then(string_value)
        .filter(|text| !text.trim().is_empty());
    let cover_url = fields
        .get("capa_url")
        .and_then(string_value)
        .filter(|url| !url.trim().is_empty());

    Ok(RemoteGame {
        id,
        record: GameRecord {
            name,
            size_gb,
            codes,
            description,
            cover_url,
        },
    })
}

/// Encode a record as a document body.
pub fn encode_record(record: &GameRecord) -> Value {
    let mut fields = Map::new();
    fields.insert("nome".into(), json!({ "stringValue": record.name }));
    fields.insert("tamanho_gb".into(), json!({ "doubleValue": record.size_gb }));
    let codes: Vec<Value> = record
        .codes
        .iter()
        .map(|code| json!({ "stringValue": code }))
        .collect();
    fields.insert(
        "codigos".into(),
        json!({ "arrayValue": { "values": codes } }),
    );
    if let Some(description) = &record.description {
        fields.insert("descricao".into(), json!({ "stringValue": description }));
    }
    if let Some(url) = &record.cover_url {
        fields.insert("capa_url".into(), json!({ "stringValue": url }));
    }
    json!({ "fields": fields })
}

fn string_value(value: &Value) -> Option<String> {
    value
        .get("stringValue")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number_value(value: &Value) -> Option<f64> {
    if let Some(number) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(number);
    }
    // Firestore sends 64-bit integers as strings.
    if let Some(integer) = value.get("integerValue") {
        return match integer {
            Value::String(text) => text.parse().ok(),
            other => other.as_f64(),
        };
    }
    value
        .get("stringValue")
        .and_then(Value::as_str)
        .and_then(|text| text.trim().replace(',', ".").parse().ok())
}

fn string_list(value: &Value) -> Vec<String> {
    if let Some(values) = value
        .get("arrayValue")
        .and_then(|array| array.get("values"))
        .and_then(Value::as_array)
    {
        return values.iter().filter_map(string_value).collect();
    }
    string_value(value)
        .filter(|code| !code.trim().is_empty())
        .map(|code| vec![code])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_loose_field_bags() -> Result<(), StoreError> {
        let page = json!({
            "documents": [
                {
                    "name": "projects/p/databases/(default)/documents/jogos_novos/abc123",
                    "fields": {
                        "nome": { "stringValue": "Okami (USA)" },
                        "tamanho_gb": { "integerValue": "4" },
                        "codigos": { "arrayValue": { "values": [ { "stringValue": "SLUS-21115" } ] } },
                        "descricao": { "stringValue": "Brush god" },
                        "capa_url": { "stringValue": "" }
                    }
                },
                {
                    "name": "projects/p/databases/(default)/documents/jogos_novos/def456",
                    "fields": {
                        "nome": { "stringValue": "Ico" },
                        "tamanho_gb": { "stringValue": "0,62" },
                        "codigos": { "stringValue": "SCUS-97113" }
                    }
                },
                {
                    "name": "projects/p/databases/(default)/documents/jogos_novos/broken",
                    "fields": { "tamanho_gb": { "doubleValue": 1.0 } }
                }
            ]
        });

        let games = decode_documents(&page)?;
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "abc123");
        assert_eq!(games[0].record.size_gb, 4.0);
        assert_eq!(games[0].record.codes, vec!["SLUS-21115".to_string()]);
        assert_eq!(games[0].record.description.as_deref(), Some("Brush god"));
        assert_eq!(games[0].record.cover_url, None);
        assert_eq!(games[1].record.size_gb, 0.62);
        assert_eq!(games[1].record.codes, vec!["SCUS-97113".to_string()]);
        Ok(())
    }

    #[test]
    fn empty_collection_has_no_documents() -> Result<(), StoreError> {
        assert!(decode_documents(&json!({}))?.is_empty());
        assert!(decode_documents(&json!({ "documents": 3 })).is_err());
        Ok(())
    }

    #[test]
    fn encodes_typed_fields() {
        let record = GameRecord {
            name: "Black (USA)".to_string(),
            size_gb: 3.99,
            codes: vec!["SLUS-21376".to_string()],
            description: Some("Shooter".to_string()),
            cover_url: None,
        };
        let body = encode_record(&record);
        assert_eq!(body["fields"]["nome"]["stringValue"], "Black (USA)");
        assert_eq!(body["fields"]["tamanho_gb"]["doubleValue"], 3.99);
        assert_eq!(
            body["fields"]["codigos"]["arrayValue"]["values"][0]["stringValue"],
            "SLUS-21376"
        );
        assert!(body["fields"].get("capa_url").is_none());

        let round_trip = decode_document(&json!({
            "name": "projects/p/databases/(default)/documents/c/x1",
            "fields": body["fields"].clone()
        }))
        .map(|game| game.record);
        assert_eq!(round_trip.ok(), Some(record));
    }

    #[test]
    fn collection_url_is_built_from_config() {
        let store = FirestoreStore::new(FirebaseConfig {
            project_id: "ps2".to_string(),
            firestore_url: "https://example.test/v1/".to_string(),
            ..FirebaseConfig::default()
        });
        assert_eq!(
            store.collection_url(),
            "https://example.test/v1/projects/ps2/databases/(default)/documents/jogos_novos"
        );
    }
}
