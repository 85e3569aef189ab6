use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::params;

/// Address of a single document inside a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentRef {
    collection: String,
    id: String,
}

impl DocumentRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full document path, in the form `collection/id`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as returned by the store: its reference and its raw payload.
///
/// Snapshots are also used as opaque pagination handles, the store is the only
/// component that inspects their content to resume a query.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub reference: DocumentRef,
    pub data: serde_json::Value,
}

impl DocumentSnapshot {
    pub fn new(reference: DocumentRef, data: serde_json::Value) -> Self {
        Self { reference, data }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// Looks up a (possibly dotted) field path inside the payload.
    pub fn field(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.')
            .try_fold(&self.data, |value, segment| value.get(segment))
    }

    /// Decodes the payload into a typed shape.
    ///
    /// When the payload is an object that does not define the
    /// [`params::DOCUMENT_ID_FIELD`] field, the document id is injected so typed
    /// shapes can carry their own identifier.
    pub fn decode<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        let mut data = self.data.clone();
        if let serde_json::Value::Object(map) = &mut data {
            map.entry(params::DOCUMENT_ID_FIELD)
                .or_insert_with(|| serde_json::Value::String(self.reference.id.clone()));
        }
        serde_json::from_value(data)
    }
}

/// Encodes a typed payload into a storable document.
///
/// The [`params::DOCUMENT_ID_FIELD`] field is stripped since the identifier is
/// carried by the [`DocumentRef`].
pub fn encode_document<T>(value: &T) -> Result<serde_json::Value, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let mut data = serde_json::to_value(value)?;
    if let serde_json::Value::Object(map) = &mut data {
        map.remove(params::DOCUMENT_ID_FIELD);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Shop {
        id: Option<String>,
        name: String,
    }

    #[test]
    fn document_path() {
        let doc = DocumentRef::new("shops", "a1");
        assert_eq!(doc.path(), "shops/a1");
        assert_eq!(doc.to_string(), "shops/a1");
    }

    #[test]
    fn decode_injects_id() {
        let snap = DocumentSnapshot::new(DocumentRef::new("shops", "a1"), json!({"name": "ramen"}));
        let shop: Shop = snap.decode().unwrap();
        assert_eq!(shop.id.as_deref(), Some("a1"));
        assert_eq!(shop.name, "ramen");
    }

    #[test]
    fn decode_keeps_explicit_id() {
        let snap = DocumentSnapshot::new(
            DocumentRef::new("shops", "a1"),
            json!({"id": "custom", "name": "ramen"}),
        );
        let shop: Shop = snap.decode().unwrap();
        assert_eq!(shop.id.as_deref(), Some("custom"));
    }

    #[test]
    fn encode_strips_id() {
        let shop = Shop {
            id: Some("a1".into()),
            name: "ramen".into(),
        };
        assert_eq!(encode_document(&shop).unwrap(), json!({"name": "ramen"}));
    }

    #[test]
    fn nested_field_lookup() {
        let snap = DocumentSnapshot::new(
            DocumentRef::new("shops", "a1"),
            json!({"address": {"city": "tokyo"}}),
        );
        assert_eq!(snap.field("address.city"), Some(&json!("tokyo")));
        assert_eq!(snap.field("address.zip"), None);
    }
}
